//! The invoking process's terminal via crossterm

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use awssh_core::traits::LocalTerminal;
use awssh_core::TerminalSize;

/// Local terminal backed by crossterm
///
/// crossterm snapshots the original mode when raw mode is enabled and puts
/// it back on disable; this type only tracks whether there is anything to
/// restore.
#[derive(Debug, Default)]
pub struct CrosstermTerminal {
    raw: AtomicBool,
}

impl CrosstermTerminal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalTerminal for CrosstermTerminal {
    fn enable_raw_mode(&self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        self.raw.store(true, Ordering::SeqCst);
        tracing::trace!("Raw mode enabled");
        Ok(())
    }

    fn restore(&self) -> io::Result<()> {
        if !self.raw.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        crossterm::terminal::disable_raw_mode()?;
        tracing::trace!("Terminal mode restored");
        Ok(())
    }

    fn size(&self) -> io::Result<TerminalSize> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(TerminalSize { cols, rows })
    }

    fn term_type(&self) -> Option<String> {
        std::env::var("TERM").ok().filter(|term| !term.is_empty())
    }
}
