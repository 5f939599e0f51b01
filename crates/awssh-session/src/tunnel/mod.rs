//! Port-forwarding tunnel
//!
//! Launching the helper and waiting for the forwarded port are separate
//! steps: the helper prints its own readiness banner, but only a successful
//! TCP connect proves the local end is accepting.

mod process;
mod readiness;

pub use process::{verify_helper, HelperProcessLauncher, TunnelProcess, DEFAULT_TERMINATE_GRACE};
pub use readiness::{
    wait_until_ready, ReadinessProbe, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
