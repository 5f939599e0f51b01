//! Interactive terminal session over the tunnel

mod driver;
mod local;
mod ssh;

pub use driver::{resolve_term, DriverState, TerminalSessionDriver, FALLBACK_TERM};
pub use local::CrosstermTerminal;
pub use ssh::{SshConnector, SshShell};
