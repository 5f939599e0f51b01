//! awssh-session: the session orchestrator
//!
//! Sequences one interactive login end to end: allocate a local port, open a
//! forwarding tunnel through the helper process, push a short-lived public
//! key, then drive an SSH terminal session over the tunnel. Cleanup restores
//! the local terminal before terminating the tunnel, on every exit path.

pub mod credential;
pub mod orchestrator;
pub mod port;
pub mod snapshot;
pub mod terminal;
pub mod tunnel;

pub use credential::CredentialInjector;
pub use orchestrator::{Orchestrator, SessionOutcome};
pub use port::allocate_local_port;
pub use terminal::{CrosstermTerminal, SshConnector, TerminalSessionDriver};
pub use tunnel::{wait_until_ready, HelperProcessLauncher, ReadinessProbe, TunnelProcess};
