//! awssh-core: Core abstractions and configuration for awssh
//!
//! This crate provides the shared types, error taxonomy, configuration
//! structures and seam traits used by the session orchestrator and the CLI.

pub mod config;
pub mod error;
pub mod forwarding;
pub mod paths;
pub mod traits;
pub mod types;

pub use error::{ConfigError, ControlPlaneError, CredentialError, SessionError};
pub use forwarding::{ForwardingParameters, TokenBundle};
pub use types::{Target, TargetId, TerminalSize};
