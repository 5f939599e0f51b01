//! Tunnel realised by the external forwarding helper
//!
//! The helper writes its diagnostics straight to the invoking terminal. Its
//! stdin is detached so it never competes with the interactive session for
//! keystrokes, and it runs in its own process group so a terminal interrupt
//! reaches only this process. A watcher task owns the
//! child: an unexpected exit is recorded and cancels the session, while a
//! requested stop sends SIGTERM, waits out a grace period and then kills.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use awssh_core::traits::{TunnelHandle, TunnelLauncher, TunnelRequest, TunnelStatus};
use awssh_core::SessionError;

/// Time the helper gets to exit after SIGTERM before it is killed
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// Bound on the `--version` pre-flight check
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Launches the forwarding helper as a child process
#[derive(Debug, Clone)]
pub struct HelperProcessLauncher {
    grace: Duration,
}

impl HelperProcessLauncher {
    pub fn new() -> Self {
        Self {
            grace: DEFAULT_TERMINATE_GRACE,
        }
    }
}

impl Default for HelperProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelLauncher for HelperProcessLauncher {
    async fn launch(
        &self,
        request: TunnelRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn TunnelHandle>, SessionError> {
        let helper = request.helper.display().to_string();
        let args = request.helper_args().map_err(|e| SessionError::TunnelSpawn {
            helper: helper.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;

        tracing::info!(
            helper = %helper,
            region = %request.region,
            local_port = request.parameters.local_port(),
            remote_port = request.parameters.remote_port(),
            "Starting tunnel helper"
        );

        let mut command = Command::new(&request.helper);
        command.args(&args);

        let process = TunnelProcess::spawn(command, cancel, self.grace).map_err(|source| {
            SessionError::TunnelSpawn {
                helper: helper.clone(),
                source,
            }
        })?;

        Ok(Box::new(process))
    }
}

/// A running helper process
pub struct TunnelProcess {
    status: watch::Receiver<TunnelStatus>,
    stop: Option<oneshot::Sender<()>>,
    watcher: Option<JoinHandle<()>>,
    grace: Duration,
}

impl TunnelProcess {
    /// Spawn `command` and start watching it
    ///
    /// `cancel` is cancelled if the process exits before [`TunnelHandle::terminate`]
    /// is called.
    pub fn spawn(
        mut command: Command,
        cancel: CancellationToken,
        grace: Duration,
    ) -> std::io::Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        tracing::debug!(pid = ?child.id(), "Tunnel helper spawned");

        let (status_tx, status_rx) = watch::channel(TunnelStatus::Running);
        let (stop_tx, stop_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch_child(child, status_tx, stop_rx, cancel, grace));

        Ok(Self {
            status: status_rx,
            stop: Some(stop_tx),
            watcher: Some(watcher),
            grace,
        })
    }
}

#[async_trait]
impl TunnelHandle for TunnelProcess {
    fn status(&self) -> TunnelStatus {
        *self.status.borrow()
    }

    async fn terminate(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Fails only if the watcher already saw the process exit.
            let _ = stop.send(());
        }

        if let Some(watcher) = self.watcher.take() {
            let bound = self.grace + Duration::from_secs(2);
            match tokio::time::timeout(bound, watcher).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Tunnel watcher task failed: {}", e),
                Err(_) => tracing::warn!(?bound, "Tunnel helper did not stop in time"),
            }
        }
    }
}

async fn watch_child(
    mut child: Child,
    status: watch::Sender<TunnelStatus>,
    stop: oneshot::Receiver<()>,
    cancel: CancellationToken,
    grace: Duration,
) {
    tokio::select! {
        biased;
        exit = child.wait() => {
            let code = match exit {
                Ok(exit) => exit.code(),
                Err(e) => {
                    tracing::warn!("Failed to wait on tunnel helper: {}", e);
                    None
                }
            };
            tracing::warn!(?code, "Tunnel helper exited");
            let _ = status.send(TunnelStatus::Exited { code });
            cancel.cancel();
        }
        // A dropped sender is treated as a stop request.
        _ = stop => {
            // The helper may have died just before teardown began.
            if let Ok(Some(exit)) = child.try_wait() {
                tracing::warn!(code = ?exit.code(), "Tunnel helper exited before teardown");
                let _ = status.send(TunnelStatus::Exited { code: exit.code() });
                return;
            }
            stop_child(&mut child, grace).await;
            let _ = status.send(TunnelStatus::Terminated);
        }
    }
}

async fn stop_child(child: &mut Child, grace: Duration) {
    if send_terminate(child) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(exit)) => {
                tracing::debug!(code = ?exit.code(), "Tunnel helper stopped");
                return;
            }
            Ok(Err(e)) => tracing::warn!("Failed to wait on tunnel helper: {}", e),
            Err(_) => tracing::debug!(?grace, "Tunnel helper ignored SIGTERM, killing"),
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!("Failed to kill tunnel helper: {}", e);
    }
    let _ = child.wait().await;
}

/// Ask the child to exit; returns false when no polite request was sent
#[cfg(unix)]
fn send_terminate(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: kill with a pid we own and a valid signal number.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    result == 0
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> bool {
    false
}

/// Check that the helper can be executed, returning its reported version
pub async fn verify_helper(helper: &Path) -> Result<String, SessionError> {
    let to_error = |source| SessionError::TunnelSpawn {
        helper: helper.display().to_string(),
        source,
    };

    let mut command = Command::new(helper);
    command
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(VERSION_CHECK_TIMEOUT, command.output())
        .await
        .map_err(|_| {
            to_error(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "version check timed out",
            ))
        })?
        .map_err(to_error)?;

    if !output.status.success() {
        return Err(to_error(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("version check exited with {}", output.status),
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::debug!(helper = %helper.display(), version = %version, "Tunnel helper available");
    Ok(version)
}
