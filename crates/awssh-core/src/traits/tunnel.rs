//! Tunnel traits
//!
//! The tunnel is realised today by an external helper process. The traits
//! keep that choice out of the orchestrator so an in-process forwarder can
//! replace it.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::forwarding::{ForwardingParameters, TokenBundle, HELPER_ACTION};

/// Everything needed to bring up one tunnel
#[derive(Debug, Clone)]
pub struct TunnelRequest {
    /// Helper executable
    pub helper: PathBuf,
    /// Session credentials from the control plane
    pub token: TokenBundle,
    /// Control-plane region
    pub region: String,
    /// Parameters the forwarding session was requested with
    pub parameters: ForwardingParameters,
    /// Control-plane endpoint URL
    pub endpoint_url: String,
}

impl TunnelRequest {
    /// Positional helper arguments:
    /// `[token, region, action, "", parameters, endpoint]`
    pub fn helper_args(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(vec![
            self.token.to_json()?,
            self.region.clone(),
            HELPER_ACTION.to_string(),
            String::new(),
            self.parameters.to_json()?,
            self.endpoint_url.clone(),
        ])
    }
}

/// Lifecycle state of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStatus {
    /// Still forwarding
    Running,
    /// Stopped on its own
    Exited { code: Option<i32> },
    /// Stopped by [`TunnelHandle::terminate`]
    Terminated,
}

/// Starts tunnels
#[async_trait]
pub trait TunnelLauncher: Send + Sync {
    /// Bring up a tunnel for `request`
    ///
    /// The returned handle must cancel `cancel` if the tunnel stops on its
    /// own, so that a dead tunnel never leaves the session waiting.
    async fn launch(
        &self,
        request: TunnelRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn TunnelHandle>, SessionError>;
}

/// A running tunnel owned by exactly one session
#[async_trait]
pub trait TunnelHandle: Send {
    /// Current status
    fn status(&self) -> TunnelStatus;

    /// Stop the tunnel without waiting indefinitely for it to exit
    async fn terminate(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetId;

    #[test]
    fn test_helper_args_layout() {
        let request = TunnelRequest {
            helper: PathBuf::from("session-manager-plugin"),
            token: TokenBundle {
                session_id: "s".to_string(),
                token_value: "t".to_string(),
                stream_url: "u".to_string(),
            },
            region: "ap-northeast-1".to_string(),
            parameters: ForwardingParameters::new(
                TargetId::parse("i-0123456789abcdef0").unwrap(),
                22,
                54321,
            ),
            endpoint_url: "https://ssm.ap-northeast-1.amazonaws.com".to_string(),
        };

        let args = request.helper_args().unwrap();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], r#"{"SessionId":"s","TokenValue":"t","StreamUrl":"u"}"#);
        assert_eq!(args[1], "ap-northeast-1");
        assert_eq!(args[2], "StartSession");
        assert_eq!(args[3], "");
        assert_eq!(
            ForwardingParameters::from_json(&args[4]).unwrap(),
            request.parameters
        );
        assert_eq!(args[5], "https://ssm.ap-northeast-1.amazonaws.com");
    }
}
