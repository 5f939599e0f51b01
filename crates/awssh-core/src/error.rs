//! Core error types for awssh

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that end a session.
///
/// Every stage hands its error back to the orchestrator, which owns teardown
/// ordering and the user-facing message.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Target not found, ambiguous, or none to choose from
    #[error("Target resolution failed: {0}")]
    Resolution(#[source] ControlPlaneError),

    /// No ephemeral port could be bound
    #[error("Failed to allocate a local port on {host}: {source}")]
    PortAllocation {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The control plane refused or failed the forwarding session request
    #[error("Failed to start forwarding session: {0}")]
    ControlPlane(#[source] ControlPlaneError),

    /// The forwarding helper could not be started
    #[error("Failed to launch tunnel helper '{helper}': {source}")]
    TunnelSpawn {
        helper: String,
        #[source]
        source: std::io::Error,
    },

    /// The forwarded port never accepted a connection
    #[error("Tunnel did not become ready on {address} within {timeout:?} (check the tunnel helper installation and target agent)")]
    TunnelTimeout { address: String, timeout: Duration },

    /// The helper process died while the session still needed it
    #[error("Tunnel helper exited unexpectedly ({})", describe_exit(.code))]
    TunnelExited { code: Option<i32> },

    /// The short-lived public key could not be pushed
    #[error("Credential injection failed: {0}")]
    CredentialInjection(#[from] CredentialError),

    /// SSH handshake or public-key authentication failed
    #[error("Authentication failed for {username}@{address}: {message}")]
    Authentication {
        username: String,
        address: SocketAddr,
        message: String,
    },

    /// Local terminal could not be switched or queried
    #[error("Terminal error: {0}")]
    Terminal(#[source] std::io::Error),

    /// I/O failure while the remote shell was running
    #[error("Session stream error: {0}")]
    Stream(String),

    /// The session was cancelled before the shell exited
    #[error("Session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Cancelled => 130,
            _ => 1,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Errors reported by the control-plane client
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    /// The target does not exist or is not visible
    #[error("Target not found: {0}")]
    NotFound(String),

    /// More than one target matched
    #[error("Target is ambiguous: {0}")]
    Ambiguous(String),

    /// The control plane answered but refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Transport or service failure
    #[error("Control plane request failed: {0}")]
    Request(String),
}

/// Credential-injection errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Public key file could not be read
    #[error("Failed to read public key {path}: {source}")]
    KeyUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Public key file content is not an OpenSSH public key
    #[error("Invalid public key in {path}: {reason}")]
    InvalidKey { path: PathBuf, reason: String },

    /// The control plane refused the key
    #[error("Public key push rejected: {0}")]
    PushRejected(#[source] ControlPlaneError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
