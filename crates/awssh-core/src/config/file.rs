//! On-disk configuration file
//!
//! Every value is optional; absent keys fall back to the built-in defaults
//! and command-line flags override whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// Top-level layout of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Defaults applied to every session
    pub session: SessionDefaults,
}

/// The `[session]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Login username on the target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Private key used for authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,

    /// Public key pushed before connecting (derived from the identity file when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_file: Option<PathBuf>,

    /// Remote SSH port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Tunnel helper executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper: Option<PathBuf>,

    /// AWS profile name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Skip the background snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_snapshot: Option<bool>,

    /// How long to wait for the tunnel, in seconds
    #[serde(with = "duration_secs", skip_serializing_if = "Option::is_none")]
    pub ready_timeout: Option<Duration>,

    /// Delay between readiness probes, in milliseconds
    #[serde(with = "duration_millis", skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<Duration>,
}
