//! Core trait definitions
//!
//! Each external collaborator of a session sits behind one of these traits so
//! the orchestrator can be driven by in-process substitutes.

mod control_plane;
mod shell;
mod terminal;
mod tunnel;

pub use control_plane::ControlPlane;
pub use shell::{RemoteShell, ShellConnector, ShellEndpoint};
pub use terminal::LocalTerminal;
pub use tunnel::{TunnelHandle, TunnelLauncher, TunnelRequest, TunnelStatus};
