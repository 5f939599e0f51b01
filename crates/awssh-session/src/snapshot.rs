//! Background snapshot of the target
//!
//! Runs alongside the session and is never awaited by it: a slow or failed
//! snapshot only produces a log line.

use std::sync::Arc;

use tokio::task::JoinHandle;

use awssh_core::traits::ControlPlane;
use awssh_core::Target;

/// Start a detached snapshot of `target`
pub fn spawn_snapshot(control_plane: Arc<dyn ControlPlane>, target: Target) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(target_id = %target.id, "Creating snapshot");
        match control_plane.create_snapshot(&target).await {
            Ok(image_id) => {
                tracing::info!(target_id = %target.id, image_id = %image_id, "Snapshot started")
            }
            Err(e) => tracing::warn!(target_id = %target.id, "Snapshot failed: {}", e),
        }
    })
}
