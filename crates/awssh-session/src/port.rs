//! Local port allocation
//!
//! The port is free when returned but not reserved: another process can
//! claim it before the tunnel helper binds. The window is tiny in practice
//! and the helper reports a bind failure by exiting, which the liveness
//! watcher turns into a session error.

use std::net::TcpListener;

use awssh_core::SessionError;

/// Ask the OS for an unused TCP port on `bind_host`
pub fn allocate_local_port(bind_host: &str) -> Result<u16, SessionError> {
    let to_error = |source| SessionError::PortAllocation {
        host: bind_host.to_string(),
        source,
    };

    let listener = TcpListener::bind((bind_host, 0)).map_err(to_error)?;
    let port = listener.local_addr().map_err(to_error)?.port();
    drop(listener);

    tracing::debug!(host = %bind_host, port, "Allocated local port");
    Ok(port)
}
