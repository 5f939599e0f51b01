//! Terminal session state machine
//!
//! `Disconnected -> Authenticated -> PtyRequested -> Streaming -> Closed`.
//! The local terminal is restored exactly once per run, on every path, as
//! the last terminal operation of the session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use awssh_core::traits::{LocalTerminal, RemoteShell, ShellConnector, ShellEndpoint};
use awssh_core::{SessionError, TerminalSize};

/// Terminal type requested when neither an override nor `$TERM` is set
pub const FALLBACK_TERM: &str = "xterm-256color";

/// Driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Disconnected,
    Authenticated,
    PtyRequested,
    Streaming,
    Closed,
}

/// Pick the terminal type for the remote pty
pub fn resolve_term(explicit: Option<&str>, environment: Option<String>) -> String {
    explicit
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .or_else(|| environment.filter(|term| !term.is_empty()))
        .unwrap_or_else(|| FALLBACK_TERM.to_string())
}

/// Restores the local terminal once, explicitly or on drop
struct RestoreGuard {
    terminal: Arc<dyn LocalTerminal>,
    restored: bool,
}

impl RestoreGuard {
    fn new(terminal: Arc<dyn LocalTerminal>) -> Self {
        Self {
            terminal,
            restored: false,
        }
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Err(e) = self.terminal.restore() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Drives one interactive login over an already-ready tunnel
pub struct TerminalSessionDriver {
    connector: Arc<dyn ShellConnector>,
    terminal: Arc<dyn LocalTerminal>,
    state: DriverState,
}

impl TerminalSessionDriver {
    pub fn new(connector: Arc<dyn ShellConnector>, terminal: Arc<dyn LocalTerminal>) -> Self {
        Self {
            connector,
            terminal,
            state: DriverState::Disconnected,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Dial, authenticate and stream until the remote shell exits
    ///
    /// Returns the remote exit status. Dial and authentication failures are
    /// returned without retry.
    pub async fn run(
        &mut self,
        endpoint: &ShellEndpoint,
        term: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError> {
        let mut guard = RestoreGuard::new(Arc::clone(&self.terminal));

        let result = self.drive(endpoint, term, cancel).await;

        guard.restore();
        self.state = DriverState::Closed;

        match &result {
            Ok(status) => tracing::debug!(status, "Terminal session closed"),
            Err(e) => tracing::debug!("Terminal session ended: {}", e),
        }
        result
    }

    async fn drive(
        &mut self,
        endpoint: &ShellEndpoint,
        term: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError> {
        let mut shell = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            shell = self.connector.connect(endpoint) => shell?,
        };
        self.state = DriverState::Authenticated;

        let result = self.interact(shell.as_mut(), term, cancel).await;
        shell.close().await;
        result
    }

    async fn interact(
        &mut self,
        shell: &mut dyn RemoteShell,
        term: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError> {
        self.terminal
            .enable_raw_mode()
            .map_err(SessionError::Terminal)?;

        let size = self.terminal.size().unwrap_or_else(|e| {
            tracing::debug!("Terminal size unavailable, using default: {}", e);
            TerminalSize::default()
        });
        let term = resolve_term(term, self.terminal.term_type());

        shell.request_pty(&term, size).await?;
        self.state = DriverState::PtyRequested;

        shell.start_shell().await?;
        self.state = DriverState::Streaming;

        shell.stream(self.terminal.as_ref(), cancel).await
    }
}
