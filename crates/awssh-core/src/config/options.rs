//! Resolved per-invocation session options

use std::path::PathBuf;
use std::time::Duration;

use super::file::SessionDefaults;
use crate::types::TargetId;

/// Default login user
pub const DEFAULT_USERNAME: &str = "ec2-user";

/// Default private key
pub const DEFAULT_IDENTITY_FILE: &str = "~/.ssh/id_rsa";

/// Default remote SSH port
pub const DEFAULT_REMOTE_PORT: u16 = 22;

/// Default tunnel helper executable
pub const DEFAULT_HELPER: &str = "session-manager-plugin";

/// Default AWS profile
pub const DEFAULT_PROFILE: &str = "default";

/// Loopback host the tunnel listens on
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// Everything one session needs, resolved from flags, the config file and
/// built-in defaults.
///
/// Passed by value into the orchestrator; nested components receive only the
/// fields they need.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Target to connect to
    pub target: TargetId,

    /// Login username on the target
    pub username: String,

    /// Private key used for authentication (may start with `~`)
    pub identity_file: PathBuf,

    /// Explicit public key path; `None` derives it from `identity_file`
    pub public_key_file: Option<PathBuf>,

    /// Remote port the tunnel forwards to
    pub remote_port: u16,

    /// Tunnel helper executable
    pub helper: PathBuf,

    /// Host the local end of the tunnel binds to
    pub bind_host: String,

    /// Upper bound on waiting for the forwarded port
    pub ready_timeout: Duration,

    /// Delay between readiness probes
    pub poll_interval: Duration,

    /// Timeout of each individual readiness probe
    pub probe_timeout: Duration,

    /// SSH connect and handshake timeout
    pub connect_timeout: Duration,

    /// Launch the background snapshot task
    pub snapshot: bool,

    /// Terminal type requested for the remote pty (`$TERM` when unset)
    pub term: Option<String>,
}

impl SessionOptions {
    /// Options for `target` with built-in defaults
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            username: DEFAULT_USERNAME.to_string(),
            identity_file: PathBuf::from(DEFAULT_IDENTITY_FILE),
            public_key_file: None,
            remote_port: DEFAULT_REMOTE_PORT,
            helper: PathBuf::from(DEFAULT_HELPER),
            bind_host: DEFAULT_BIND_HOST.to_string(),
            ready_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            probe_timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(30),
            snapshot: true,
            term: None,
        }
    }

    /// Overlay values from the config file's `[session]` table
    pub fn with_defaults(mut self, defaults: &SessionDefaults) -> Self {
        if let Some(username) = &defaults.username {
            self.username = username.clone();
        }
        if let Some(identity_file) = &defaults.identity_file {
            self.identity_file = identity_file.clone();
        }
        if let Some(public_key_file) = &defaults.public_key_file {
            self.public_key_file = Some(public_key_file.clone());
        }
        if let Some(port) = defaults.port {
            self.remote_port = port;
        }
        if let Some(helper) = &defaults.helper {
            self.helper = helper.clone();
        }
        if let Some(disable) = defaults.disable_snapshot {
            self.snapshot = !disable;
        }
        if let Some(timeout) = defaults.ready_timeout {
            self.ready_timeout = timeout;
        }
        if let Some(interval) = defaults.poll_interval {
            self.poll_interval = interval;
        }
        self
    }

    /// Explicit public key path, or `None` when it is derived later
    pub fn public_key_override(&self) -> Option<&std::path::Path> {
        self.public_key_file.as_deref()
    }
}
