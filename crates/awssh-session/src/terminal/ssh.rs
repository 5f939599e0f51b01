//! SSH client over the local end of the tunnel

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Pty};
use russh_keys::key::PublicKey;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use awssh_core::paths::expand_home;
use awssh_core::traits::{LocalTerminal, RemoteShell, ShellConnector, ShellEndpoint};
use awssh_core::{SessionError, TerminalSize};

/// Input and output baud rate advertised in the pty request
const TERMINAL_SPEED: u32 = 14400;

/// Buffered keystroke chunks between the stdin thread and the session loop
const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Extended data type code for stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Connects with russh using public-key authentication
pub struct SshConnector {
    config: Arc<Config>,
}

impl SshConnector {
    pub fn new() -> Self {
        Self {
            config: Arc::new(Config::default()),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(&self, endpoint: &ShellEndpoint) -> Result<Box<dyn RemoteShell>, SessionError> {
        let auth_error = |message: String| SessionError::Authentication {
            username: endpoint.username.clone(),
            address: endpoint.address,
            message,
        };

        let key_path = expand_home(&endpoint.identity_file);
        let key = russh_keys::load_secret_key(&key_path, None).map_err(|e| {
            auth_error(format!(
                "failed to load identity {}: {}",
                key_path.display(),
                e
            ))
        })?;

        tracing::debug!("Connecting to {}", endpoint.address);
        let mut handle = tokio::time::timeout(
            endpoint.connect_timeout,
            client::connect(Arc::clone(&self.config), endpoint.address, TrustedTunnelHandler),
        )
        .await
        .map_err(|_| auth_error("connection timed out".to_string()))?
        .map_err(|e| auth_error(format!("handshake failed: {}", e)))?;

        tracing::debug!("Authenticating as user '{}'", endpoint.username);
        let authenticated = handle
            .authenticate_publickey(&endpoint.username, Arc::new(key))
            .await
            .map_err(|e| auth_error(format!("authentication error: {}", e)))?;

        if !authenticated {
            return Err(auth_error("public key rejected".to_string()));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Stream(format!("failed to open session channel: {}", e)))?;

        tracing::info!(
            "Authenticated as {} on {}",
            endpoint.username,
            endpoint.address
        );
        Ok(Box::new(SshShell { handle, channel }))
    }
}

/// Host key policy for connections made through the local tunnel
///
/// The peer is always the loopback end of a tunnel the control plane
/// brokered for this target, and targets rotate host keys freely, so any
/// server key is accepted. This is a deliberate trust decision scoped to the
/// tunnel and must not be reused for direct connections.
struct TrustedTunnelHandler;

#[async_trait]
impl client::Handler for TrustedTunnelHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

/// An authenticated russh session with one session channel
pub struct SshShell {
    handle: Handle<TrustedTunnelHandler>,
    channel: Channel<Msg>,
}

fn stream_error(context: &str, e: impl std::fmt::Display) -> SessionError {
    SessionError::Stream(format!("{}: {}", context, e))
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn request_pty(&mut self, term: &str, size: TerminalSize) -> Result<(), SessionError> {
        tracing::debug!(term, cols = size.cols, rows = size.rows, "Requesting pty");
        self.channel
            .request_pty(
                true,
                term,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &[
                    (Pty::ECHO, 1),
                    (Pty::TTY_OP_ISPEED, TERMINAL_SPEED),
                    (Pty::TTY_OP_OSPEED, TERMINAL_SPEED),
                ],
            )
            .await
            .map_err(|e| stream_error("pty request failed", e))
    }

    async fn start_shell(&mut self) -> Result<(), SessionError> {
        self.channel
            .request_shell(true)
            .await
            .map_err(|e| stream_error("shell request failed", e))
    }

    async fn stream(
        &mut self,
        terminal: &dyn LocalTerminal,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError> {
        let mut input = spawn_stdin_reader();
        let mut input_open = true;
        let mut resize = ResizeEvents::new();
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();

        let mut exit_status = None;
        let mut exit_signal = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),

                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        write_all(&mut stdout, &data).await?;
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        if ext == SSH_EXTENDED_DATA_STDERR {
                            write_all(&mut stderr, &data).await?;
                        } else {
                            write_all(&mut stdout, &data).await?;
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        tracing::debug!(status, "Remote shell exited");
                        exit_status = Some(status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        tracing::debug!(signal = ?signal_name, "Remote shell killed by signal");
                        exit_signal = Some(format!("{:?}", signal_name));
                    }
                    Some(ChannelMsg::Eof) => {
                        tracing::trace!("Remote EOF");
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                },

                chunk = input.recv(), if input_open => match chunk {
                    Some(bytes) => {
                        self.channel
                            .data(&bytes[..])
                            .await
                            .map_err(|e| stream_error("failed to send input", e))?;
                    }
                    None => {
                        input_open = false;
                        let _ = self.channel.eof().await;
                    }
                },

                Some(()) = resize.recv() => {
                    if let Ok(size) = terminal.size() {
                        tracing::trace!(cols = size.cols, rows = size.rows, "Window changed");
                        let _ = self
                            .channel
                            .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
                            .await;
                    }
                }
            }
        }

        match (exit_status, exit_signal) {
            (Some(status), _) => Ok(status),
            (None, Some(signal)) => Err(SessionError::Stream(format!(
                "remote shell terminated by signal {}",
                signal
            ))),
            (None, None) => Err(SessionError::Stream(
                "connection closed without an exit status".to_string(),
            )),
        }
    }

    async fn close(&mut self) {
        let _ = self.channel.close().await;
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("Disconnect failed: {}", e);
        }
    }
}

async fn write_all<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<(), SessionError> {
    writer
        .write_all(data)
        .await
        .map_err(|e| stream_error("failed to write output", e))?;
    writer
        .flush()
        .await
        .map_err(|e| stream_error("failed to write output", e))
}

/// Forward raw stdin bytes from a dedicated thread
///
/// Blocking reads on stdin cannot be interrupted, so the thread is left
/// behind when the session ends; it exits on the next keystroke or with the
/// process.
fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);

    let spawned = std::thread::Builder::new()
        .name("awssh-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut stdin = stdin.lock();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        // The receiver reports a closed channel and the remote gets EOF.
        tracing::warn!("Failed to start stdin reader: {}", e);
    }

    rx
}

/// Local window-size change notifications
struct ResizeEvents {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl ResizeEvents {
    #[cfg(unix)]
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let signal = match signal(SignalKind::window_change()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                tracing::debug!("Window resize events unavailable: {}", e);
                None
            }
        };
        Self { signal }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> Option<()> {
        match self.signal.as_mut() {
            Some(signal) => signal.recv().await,
            None => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}
