//! awssh: command-line front end for the session orchestrator
//!
//! Provides the AWS-backed control plane, interactive selection prompts and
//! user-facing output used by the `awssh` binary.

pub mod aws;
pub mod output;
pub mod select;
