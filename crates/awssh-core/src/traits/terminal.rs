//! Local terminal trait

use std::io;

use crate::types::TerminalSize;

/// The invoking process's terminal
pub trait LocalTerminal: Send + Sync {
    /// Snapshot the current mode and switch to raw mode
    fn enable_raw_mode(&self) -> io::Result<()>;

    /// Restore the snapshotted mode; a no-op if raw mode was never entered
    fn restore(&self) -> io::Result<()>;

    /// Current dimensions
    fn size(&self) -> io::Result<TerminalSize>;

    /// Terminal type advertised by the environment
    fn term_type(&self) -> Option<String>;
}
