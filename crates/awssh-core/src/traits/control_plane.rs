//! Control-plane client trait

use async_trait::async_trait;

use crate::error::ControlPlaneError;
use crate::forwarding::{ForwardingParameters, TokenBundle};
use crate::types::{Target, TargetId};

/// Cloud control plane that brokers targets, tunnels and credentials
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Resolve an identifier to a live target, including its placement
    async fn resolve_target(&self, id: &TargetId) -> Result<Target, ControlPlaneError>;

    /// List targets that can currently be connected to
    async fn list_targets(&self) -> Result<Vec<Target>, ControlPlaneError>;

    /// Request a short-lived forwarding session from `local_port` to
    /// `remote_port` on `target`
    ///
    /// Returns the token bundle for the helper and the parameters the request
    /// was made with.
    async fn start_forwarding_session(
        &self,
        target: &Target,
        remote_port: u16,
        local_port: u16,
    ) -> Result<(TokenBundle, ForwardingParameters), ControlPlaneError>;

    /// Push a short-lived public key for `username` to `target`
    async fn push_credential(
        &self,
        target: &Target,
        username: &str,
        public_key: &str,
    ) -> Result<(), ControlPlaneError>;

    /// Create a point-in-time image of `target`, returning its identifier
    async fn create_snapshot(&self, target: &Target) -> Result<String, ControlPlaneError>;

    /// Region the client talks to
    fn region(&self) -> &str;

    /// Endpoint URL handed to the tunnel helper
    fn endpoint_url(&self) -> String;
}
