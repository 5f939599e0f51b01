//! Bounded readiness polling for the forwarded port

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use awssh_core::SessionError;

/// Default delay between connection attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on a single connection attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(200);

/// Polls a TCP endpoint until it accepts a connection
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    pub host: String,
    pub port: u16,
    /// Overall deadline
    pub timeout: Duration,
    /// Delay between attempts
    pub interval: Duration,
    /// Bound on each attempt
    pub attempt_timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Wait until the endpoint accepts a connection, the deadline passes, or
    /// `cancel` fires
    ///
    /// Returns the address that accepted the probe. The probe connection is
    /// closed immediately on success.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<SocketAddr, SessionError> {
        let deadline = Instant::now() + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let attempt = timeout(
                self.attempt_timeout,
                TcpStream::connect((self.host.as_str(), self.port)),
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                result = attempt => match result {
                    Ok(Ok(stream)) => match stream.peer_addr() {
                        Ok(address) => {
                            drop(stream);
                            tracing::debug!(%address, attempts, "Tunnel port is accepting connections");
                            return Ok(address);
                        }
                        Err(e) => {
                            tracing::trace!(address = %self.address(), attempts, "Probe dropped: {}", e);
                        }
                    },
                    Ok(Err(e)) => {
                        tracing::trace!(address = %self.address(), attempts, "Probe refused: {}", e);
                    }
                    Err(_) => {
                        tracing::trace!(address = %self.address(), attempts, "Probe timed out");
                    }
                },
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(address = %self.address(), attempts, "Tunnel never became ready");
                return Err(SessionError::TunnelTimeout {
                    address: self.address(),
                    timeout: self.timeout,
                });
            }

            let pause = self.interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = sleep(pause) => {}
            }
        }
    }
}

/// Wait until `host:port` accepts a TCP connection, bounded by `timeout`
pub async fn wait_until_ready(
    host: &str,
    port: u16,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    ReadinessProbe::new(host, port, timeout)
        .wait(cancel)
        .await
        .map(|_| ())
}
