//! End-to-end orchestrator behavior against in-process fakes
//!
//! Every fake appends to a shared event log so the tests can check both call
//! counts and cleanup ordering.

use std::io;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use awssh_core::config::SessionOptions;
use awssh_core::traits::{
    ControlPlane, LocalTerminal, RemoteShell, ShellConnector, ShellEndpoint, TunnelHandle,
    TunnelLauncher, TunnelRequest, TunnelStatus,
};
use awssh_core::{
    ControlPlaneError, ForwardingParameters, SessionError, Target, TargetId, TerminalSize,
    TokenBundle,
};
use awssh_session::Orchestrator;

const PUBLIC_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl test@awssh";

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<&'static str>>>);

impl Events {
    fn push(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| **e == event).count()
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| *e == event)
    }

    fn last(&self) -> Option<&'static str> {
        self.0.lock().unwrap().last().copied()
    }
}

// ---------------------------------------------------------------------------
// Control plane
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeControlPlane {
    events: Events,
    missing_target: bool,
    reject_push: bool,
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn resolve_target(&self, id: &TargetId) -> Result<Target, ControlPlaneError> {
        self.events.push("resolve");
        if self.missing_target {
            return Err(ControlPlaneError::NotFound(id.to_string()));
        }
        Ok(Target::new(id.clone())
            .with_name("web-1")
            .with_placement("ap-northeast-1a"))
    }

    async fn list_targets(&self) -> Result<Vec<Target>, ControlPlaneError> {
        Ok(Vec::new())
    }

    async fn start_forwarding_session(
        &self,
        target: &Target,
        remote_port: u16,
        local_port: u16,
    ) -> Result<(TokenBundle, ForwardingParameters), ControlPlaneError> {
        self.events.push("start_session");
        let token = TokenBundle {
            session_id: "session-1".to_string(),
            token_value: "secret".to_string(),
            stream_url: "wss://example.invalid/session-1".to_string(),
        };
        Ok((
            token,
            ForwardingParameters::new(target.id.clone(), remote_port, local_port),
        ))
    }

    async fn push_credential(
        &self,
        _target: &Target,
        _username: &str,
        public_key: &str,
    ) -> Result<(), ControlPlaneError> {
        self.events.push("push");
        assert_eq!(public_key, PUBLIC_KEY);
        if self.reject_push {
            return Err(ControlPlaneError::Rejected(
                "SendSSHPublicKey request unsuccessful".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_snapshot(&self, _target: &Target) -> Result<String, ControlPlaneError> {
        self.events.push("snapshot");
        Ok("ami-0123456789abcdef0".to_string())
    }

    fn region(&self) -> &str {
        "ap-northeast-1"
    }

    fn endpoint_url(&self) -> String {
        "https://ssm.ap-northeast-1.amazonaws.com".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tunnel
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum TunnelBehavior {
    /// Listen on the requested port until terminated
    Listen,
    /// Never listen
    Silent,
    /// Listen, then exit on its own after the delay
    DieAfter(Duration),
    /// Listen; the exit is only observed once teardown starts
    ExitSeenAtTeardown,
}

struct FakeLauncher {
    events: Events,
    behavior: TunnelBehavior,
    requests: Mutex<Vec<TunnelRequest>>,
}

impl FakeLauncher {
    fn new(events: Events, behavior: TunnelBehavior) -> Self {
        Self {
            events,
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }
}

struct FakeTunnel {
    events: Events,
    listener: Arc<Mutex<Option<TcpListener>>>,
    status: Arc<Mutex<TunnelStatus>>,
    exit_seen_at_teardown: bool,
}

#[async_trait]
impl TunnelLauncher for FakeLauncher {
    async fn launch(
        &self,
        request: TunnelRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn TunnelHandle>, SessionError> {
        self.events.push("launch");
        let port = request.parameters.local_port();
        self.requests.lock().unwrap().push(request);

        let listener = match self.behavior {
            TunnelBehavior::Silent => None,
            _ => Some(TcpListener::bind(("127.0.0.1", port)).unwrap()),
        };
        let listener = Arc::new(Mutex::new(listener));
        let status = Arc::new(Mutex::new(TunnelStatus::Running));

        if let TunnelBehavior::DieAfter(delay) = self.behavior {
            let listener = Arc::clone(&listener);
            let status = Arc::clone(&status);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                listener.lock().unwrap().take();
                *status.lock().unwrap() = TunnelStatus::Exited { code: Some(1) };
                cancel.cancel();
            });
        }

        Ok(Box::new(FakeTunnel {
            events: self.events.clone(),
            listener,
            status,
            exit_seen_at_teardown: matches!(self.behavior, TunnelBehavior::ExitSeenAtTeardown),
        }))
    }
}

#[async_trait]
impl TunnelHandle for FakeTunnel {
    fn status(&self) -> TunnelStatus {
        *self.status.lock().unwrap()
    }

    async fn terminate(&mut self) {
        self.events.push("terminate");
        self.listener.lock().unwrap().take();
        let mut status = self.status.lock().unwrap();
        if *status == TunnelStatus::Running {
            *status = if self.exit_seen_at_teardown {
                TunnelStatus::Exited { code: Some(255) }
            } else {
                TunnelStatus::Terminated
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Shell and terminal
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum ShellBehavior {
    Exit(u32),
    RejectAuth,
    StreamError,
    /// Stream until the session is cancelled
    Hang,
}

struct FakeConnector {
    events: Events,
    behavior: ShellBehavior,
}

struct FakeShell {
    events: Events,
    behavior: ShellBehavior,
}

#[async_trait]
impl ShellConnector for FakeConnector {
    async fn connect(&self, endpoint: &ShellEndpoint) -> Result<Box<dyn RemoteShell>, SessionError> {
        self.events.push("connect");
        assert!(endpoint.address.ip().is_loopback());

        if let ShellBehavior::RejectAuth = self.behavior {
            return Err(SessionError::Authentication {
                username: endpoint.username.clone(),
                address: endpoint.address,
                message: "public key rejected".to_string(),
            });
        }
        Ok(Box::new(FakeShell {
            events: self.events.clone(),
            behavior: self.behavior,
        }))
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn request_pty(&mut self, _term: &str, _size: TerminalSize) -> Result<(), SessionError> {
        self.events.push("pty");
        Ok(())
    }

    async fn start_shell(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn stream(
        &mut self,
        _terminal: &dyn LocalTerminal,
        cancel: &CancellationToken,
    ) -> Result<u32, SessionError> {
        match self.behavior {
            ShellBehavior::Exit(status) => Ok(status),
            ShellBehavior::StreamError => {
                Err(SessionError::Stream("connection reset by peer".to_string()))
            }
            ShellBehavior::Hang => {
                cancel.cancelled().await;
                Err(SessionError::Cancelled)
            }
            ShellBehavior::RejectAuth => unreachable!(),
        }
    }

    async fn close(&mut self) {
        self.events.push("close");
    }
}

struct FakeTerminal {
    events: Events,
}

impl LocalTerminal for FakeTerminal {
    fn enable_raw_mode(&self) -> io::Result<()> {
        self.events.push("raw");
        Ok(())
    }

    fn restore(&self) -> io::Result<()> {
        self.events.push("restore");
        Ok(())
    }

    fn size(&self) -> io::Result<TerminalSize> {
        Ok(TerminalSize { cols: 100, rows: 30 })
    }

    fn term_type(&self) -> Option<String> {
        Some("xterm".to_string())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    events: Events,
    launcher: Arc<FakeLauncher>,
    orchestrator: Orchestrator,
    options: SessionOptions,
    _keys: tempfile::TempDir,
}

fn harness_with(
    control_plane: FakeControlPlane,
    tunnel: TunnelBehavior,
    shell: ShellBehavior,
) -> Harness {
    let events = control_plane.events.clone();

    let keys = tempfile::tempdir().unwrap();
    let identity: PathBuf = keys.path().join("id_ed25519");
    std::fs::write(keys.path().join("id_ed25519.pub"), format!("{}\n", PUBLIC_KEY)).unwrap();

    let launcher = Arc::new(FakeLauncher::new(events.clone(), tunnel));
    let orchestrator = Orchestrator::new(
        Arc::new(control_plane),
        launcher.clone(),
        Arc::new(FakeConnector {
            events: events.clone(),
            behavior: shell,
        }),
        Arc::new(FakeTerminal {
            events: events.clone(),
        }),
    );

    let mut options = SessionOptions::new(TargetId::parse("i-0123456789abcdef0").unwrap());
    options.identity_file = identity;
    options.ready_timeout = Duration::from_secs(5);
    options.poll_interval = Duration::from_millis(20);
    options.snapshot = false;

    Harness {
        events,
        launcher,
        orchestrator,
        options,
        _keys: keys,
    }
}

fn harness(tunnel: TunnelBehavior, shell: ShellBehavior) -> Harness {
    harness_with(FakeControlPlane::default(), tunnel, shell)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_successful_session_propagates_exit_status() {
    let h = harness(TunnelBehavior::Listen, ShellBehavior::Exit(3));

    let outcome = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.exit_code, 3);

    let requests = h.launcher.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].parameters.local_port(), outcome.local_port);
    assert_eq!(requests[0].parameters.remote_port(), 22);
    assert_eq!(requests[0].region, "ap-northeast-1");
    drop(requests);

    assert_eq!(h.events.count("push"), 1);
    assert_eq!(h.events.count("connect"), 1);
    assert_eq!(h.events.count("restore"), 1);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_stage_ordering() {
    let h = harness(TunnelBehavior::Listen, ShellBehavior::Exit(0));
    h.orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap();

    let at = |event| h.events.position(event).unwrap();
    assert!(at("resolve") < at("start_session"));
    assert!(at("start_session") < at("launch"));
    assert!(at("launch") < at("push"));
    assert!(at("push") < at("connect"));
    assert!(at("raw") < at("pty"));
    assert!(at("close") < at("restore"));
    assert!(at("restore") < at("terminate"));
    assert_eq!(h.events.last(), Some("terminate"));
}

#[tokio::test]
async fn test_tunnel_never_ready_times_out() {
    let mut h = harness(TunnelBehavior::Silent, ShellBehavior::Exit(0));
    h.options.ready_timeout = Duration::from_millis(300);

    let started = std::time::Instant::now();
    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::TunnelTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(h.events.count("push"), 0);
    assert_eq!(h.events.count("connect"), 0);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_auth_failure_cleans_up() {
    let h = harness(TunnelBehavior::Listen, ShellBehavior::RejectAuth);

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Authentication { .. }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(h.events.count("connect"), 1);
    assert_eq!(h.events.count("restore"), 1);
    assert_eq!(h.events.count("terminate"), 1);
    assert_eq!(h.events.last(), Some("terminate"));
}

#[tokio::test]
async fn test_stream_error_cleans_up() {
    let h = harness(TunnelBehavior::Listen, ShellBehavior::StreamError);

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Stream(_)));
    assert_eq!(h.events.count("restore"), 1);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_tunnel_death_mid_session_is_reported() {
    let h = harness(
        TunnelBehavior::DieAfter(Duration::from_millis(300)),
        ShellBehavior::Hang,
    );

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        h.orchestrator.run(h.options.clone(), CancellationToken::new()),
    )
    .await
    .expect("a dead tunnel must end the session")
    .unwrap_err();

    assert!(matches!(err, SessionError::TunnelExited { code: Some(1) }));
    assert_eq!(h.events.count("restore"), 1);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_tunnel_exit_seen_at_teardown_after_stream_error() {
    let h = harness(TunnelBehavior::ExitSeenAtTeardown, ShellBehavior::StreamError);

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::TunnelExited { code: Some(255) }));
    assert_eq!(h.events.count("restore"), 1);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_tunnel_exit_seen_at_teardown_after_handshake_failure() {
    let h = harness(TunnelBehavior::ExitSeenAtTeardown, ShellBehavior::RejectAuth);

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::TunnelExited { code: Some(255) }));
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_user_cancel_wins_over_tunnel_exit() {
    let h = harness(TunnelBehavior::ExitSeenAtTeardown, ShellBehavior::Hang);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = h.orchestrator.run(h.options.clone(), cancel).await.unwrap_err();

    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(err.exit_code(), 130);
}

#[tokio::test]
async fn test_injection_failure_skips_authentication() {
    let control_plane = FakeControlPlane {
        reject_push: true,
        ..Default::default()
    };
    let h = harness_with(control_plane, TunnelBehavior::Listen, ShellBehavior::Exit(0));

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::CredentialInjection(_)));
    assert_eq!(h.events.count("connect"), 0);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_missing_public_key_fails_before_authentication() {
    let mut h = harness(TunnelBehavior::Listen, ShellBehavior::Exit(0));
    h.options.public_key_file = Some(PathBuf::from("/nonexistent/awssh/key.pub"));

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::CredentialInjection(_)));
    assert_eq!(h.events.count("push"), 0);
    assert_eq!(h.events.count("connect"), 0);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_resolution_failure_launches_nothing() {
    let control_plane = FakeControlPlane {
        missing_target: true,
        ..Default::default()
    };
    let h = harness_with(control_plane, TunnelBehavior::Listen, ShellBehavior::Exit(0));

    let err = h
        .orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Resolution(_)));
    assert_eq!(h.events.count("launch"), 0);
    assert_eq!(h.events.count("terminate"), 0);
}

#[tokio::test]
async fn test_user_cancel_during_readiness() {
    let mut h = harness(TunnelBehavior::Silent, ShellBehavior::Exit(0));
    h.options.ready_timeout = Duration::from_secs(30);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = h.orchestrator.run(h.options.clone(), cancel).await.unwrap_err();

    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(err.exit_code(), 130);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_user_cancel_mid_session() {
    let h = harness(TunnelBehavior::Listen, ShellBehavior::Hang);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = h.orchestrator.run(h.options.clone(), cancel).await.unwrap_err();

    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(h.events.count("restore"), 1);
    assert_eq!(h.events.count("terminate"), 1);
}

#[tokio::test]
async fn test_snapshot_runs_alongside_session() {
    let mut h = harness(TunnelBehavior::Listen, ShellBehavior::Exit(0));
    h.options.snapshot = true;

    h.orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap();

    for _ in 0..50 {
        if h.events.count("snapshot") == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("snapshot task never ran");
}

#[tokio::test]
async fn test_snapshot_disabled() {
    let h = harness(TunnelBehavior::Listen, ShellBehavior::Exit(0));

    h.orchestrator
        .run(h.options.clone(), CancellationToken::new())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.events.count("snapshot"), 0);
}
