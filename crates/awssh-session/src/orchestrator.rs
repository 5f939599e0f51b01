//! Session orchestrator
//!
//! Runs the stages strictly in sequence: resolve, allocate, request the
//! forwarding session, launch the tunnel, wait for it, inject the key, then
//! drive the terminal. One cancellation scope covers the whole session. The
//! terminal is restored inside the driver; terminating the tunnel is always
//! the last cleanup step once it has been launched.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use awssh_core::config::SessionOptions;
use awssh_core::traits::{
    ControlPlane, LocalTerminal, ShellConnector, ShellEndpoint, TunnelHandle, TunnelLauncher,
    TunnelRequest, TunnelStatus,
};
use awssh_core::{SessionError, Target, TokenBundle};

use crate::credential::CredentialInjector;
use crate::port::allocate_local_port;
use crate::snapshot::spawn_snapshot;
use crate::terminal::TerminalSessionDriver;
use crate::tunnel::ReadinessProbe;

/// Result of a session that reached the remote shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Exit status reported by the remote shell
    pub exit_code: u32,
    /// Local end of the tunnel the session used
    pub local_port: u16,
}

/// State of one invocation, owned by the orchestrator only
struct Session {
    target: Target,
    local_port: u16,
    token: TokenBundle,
    tunnel: Box<dyn TunnelHandle>,
}

/// Sequences one interactive login end to end
pub struct Orchestrator {
    control_plane: Arc<dyn ControlPlane>,
    launcher: Arc<dyn TunnelLauncher>,
    connector: Arc<dyn ShellConnector>,
    terminal: Arc<dyn LocalTerminal>,
}

impl Orchestrator {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        launcher: Arc<dyn TunnelLauncher>,
        connector: Arc<dyn ShellConnector>,
        terminal: Arc<dyn LocalTerminal>,
    ) -> Self {
        Self {
            control_plane,
            launcher,
            connector,
            terminal,
        }
    }

    /// Run a session to completion
    ///
    /// `cancel` aborts whichever stage is in flight; resources acquired so
    /// far are released in reverse order before this returns.
    pub async fn run(
        &self,
        options: SessionOptions,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        let target = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            target = self.control_plane.resolve_target(&options.target) => {
                target.map_err(SessionError::Resolution)?
            }
        };
        tracing::info!(
            target_id = %target.id,
            name = target.name.as_deref().unwrap_or("-"),
            "Target resolved"
        );

        if options.snapshot {
            spawn_snapshot(Arc::clone(&self.control_plane), target.clone());
        }

        let local_port = allocate_local_port(&options.bind_host)?;

        let (token, parameters) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            started = self.control_plane.start_forwarding_session(
                &target,
                options.remote_port,
                local_port,
            ) => started.map_err(SessionError::ControlPlane)?,
        };
        tracing::debug!(session_id = %token.session_id, "Forwarding session started");

        let request = TunnelRequest {
            helper: options.helper.clone(),
            token: token.clone(),
            region: self.control_plane.region().to_string(),
            parameters,
            endpoint_url: self.control_plane.endpoint_url(),
        };

        // A dying tunnel cancels only this scope, so it can be told apart
        // from a user interrupt.
        let session_cancel = cancel.child_token();
        let tunnel = self.launcher.launch(request, session_cancel.clone()).await?;

        let mut session = Session {
            target,
            local_port,
            token,
            tunnel,
        };

        let result = self.attach(&session, &options, &session_cancel).await;

        // Read after terminate: the helper may exit while the shell is
        // already failing on the closed socket.
        session.tunnel.terminate().await;
        let status = session.tunnel.status();
        tracing::debug!(
            session_id = %session.token.session_id,
            ?status,
            "Tunnel torn down"
        );

        let result = match (result, status) {
            (
                Err(
                    SessionError::Cancelled
                    | SessionError::Stream(_)
                    | SessionError::Authentication { .. },
                ),
                TunnelStatus::Exited { code },
            ) if !cancel.is_cancelled() => Err(SessionError::TunnelExited { code }),
            (result, _) => result,
        };

        result.map(|exit_code| SessionOutcome {
            exit_code,
            local_port: session.local_port,
        })
    }

    /// Everything that runs while the tunnel is up
    async fn attach(
        &self,
        session: &Session,
        options: &SessionOptions,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError> {
        let address =
            ReadinessProbe::new(&options.bind_host, session.local_port, options.ready_timeout)
                .with_interval(options.poll_interval)
                .with_attempt_timeout(options.probe_timeout)
                .wait(cancel)
                .await?;
        tracing::info!(%address, "Tunnel ready");

        let injector = CredentialInjector::new(Arc::clone(&self.control_plane));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            injected = injector.inject(
                &session.target,
                &options.username,
                &options.identity_file,
                options.public_key_override(),
            ) => { injected?; }
        }

        let endpoint = ShellEndpoint {
            address,
            username: options.username.clone(),
            identity_file: options.identity_file.clone(),
            connect_timeout: options.connect_timeout,
        };

        let mut driver =
            TerminalSessionDriver::new(Arc::clone(&self.connector), Arc::clone(&self.terminal));
        driver
            .run(&endpoint, options.term.as_deref(), cancel)
            .await
    }
}
