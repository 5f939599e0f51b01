//! Short-lived credential injection
//!
//! Reads the user's public key and pushes it to the target through the
//! control plane. The key is only valid on the target for a short window,
//! so injection runs after the tunnel is ready and immediately before the
//! SSH handshake.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use awssh_core::paths::{expand_home, public_key_path};
use awssh_core::traits::ControlPlane;
use awssh_core::{CredentialError, Target};

/// Pushes public keys to targets
pub struct CredentialInjector {
    control_plane: Arc<dyn ControlPlane>,
}

impl CredentialInjector {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Read the public key for `identity_file` and push it for `username`
    ///
    /// The public key path is derived here, not when options are built, so an
    /// explicit override always wins. Returns the path that was pushed.
    pub async fn inject(
        &self,
        target: &Target,
        username: &str,
        identity_file: &Path,
        explicit_public_key: Option<&Path>,
    ) -> Result<PathBuf, CredentialError> {
        let path = expand_home(&public_key_path(identity_file, explicit_public_key));
        let public_key = read_public_key(&path).await?;

        tracing::debug!(
            target_id = %target.id,
            username = %username,
            key = %path.display(),
            "Pushing public key"
        );

        self.control_plane
            .push_credential(target, username, &public_key)
            .await
            .map_err(CredentialError::PushRejected)?;

        tracing::info!(target_id = %target.id, username = %username, "Public key pushed");
        Ok(path)
    }
}

/// Read and validate an OpenSSH public key file
pub async fn read_public_key(path: &Path) -> Result<String, CredentialError> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialError::KeyUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

    let public_key = content.trim();
    validate_public_key(public_key).map_err(|reason| CredentialError::InvalidKey {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(public_key.to_string())
}

/// Check `<algorithm> <base64> [comment]` form and decode the key body
fn validate_public_key(line: &str) -> Result<(), String> {
    let mut fields = line.split_whitespace();

    let algorithm = fields
        .next()
        .ok_or_else(|| "file is empty".to_string())?;
    let body = fields
        .next()
        .ok_or_else(|| format!("missing key data after '{}'", algorithm))?;

    if algorithm.starts_with("-----") {
        return Err("looks like a private key".to_string());
    }

    russh_keys::parse_public_key_base64(body).map_err(|e| format!("{}", e))?;
    Ok(())
}
