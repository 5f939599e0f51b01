//! Configuration management for awssh

mod file;
mod options;
mod profiles;
pub mod serde_utils;

pub use file::{ConfigFile, SessionDefaults};
pub use options::{
    SessionOptions, DEFAULT_BIND_HOST, DEFAULT_HELPER, DEFAULT_IDENTITY_FILE, DEFAULT_PROFILE,
    DEFAULT_REMOTE_PORT, DEFAULT_USERNAME,
};
pub use profiles::{aws_config_path, list_role_profiles, parse_role_profiles};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("awssh")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}
