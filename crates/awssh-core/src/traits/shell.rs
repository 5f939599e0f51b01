//! Remote shell traits

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::LocalTerminal;
use crate::error::SessionError;
use crate::types::TerminalSize;

/// Where and as whom to log in
#[derive(Debug, Clone)]
pub struct ShellEndpoint {
    /// Local end of the tunnel
    pub address: SocketAddr,
    /// Login username
    pub username: String,
    /// Private key for public-key authentication
    pub identity_file: PathBuf,
    /// Bound on dial plus handshake
    pub connect_timeout: Duration,
}

/// Dials and authenticates remote shells
#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// Dial `endpoint` and authenticate; no retry is attempted
    async fn connect(&self, endpoint: &ShellEndpoint) -> Result<Box<dyn RemoteShell>, SessionError>;
}

/// An authenticated remote shell session
#[async_trait]
pub trait RemoteShell: Send {
    /// Request an interactive pseudo-terminal
    async fn request_pty(&mut self, term: &str, size: TerminalSize) -> Result<(), SessionError>;

    /// Start the login shell
    async fn start_shell(&mut self) -> Result<(), SessionError>;

    /// Pump I/O between the shell and the local standard streams until the
    /// remote shell exits, returning its exit status
    async fn stream(
        &mut self,
        terminal: &dyn LocalTerminal,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError>;

    /// Close the connection
    async fn close(&mut self);
}
