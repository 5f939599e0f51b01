//! Profile discovery from the AWS shared config file

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Location of the shared AWS config file (`AWS_CONFIG_FILE` or `~/.aws/config`)
pub fn aws_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("AWS_CONFIG_FILE") {
        return PathBuf::from(path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aws")
        .join("config")
}

/// Read `path` and list the profiles that assume a role
pub fn list_role_profiles(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    let profiles = parse_role_profiles(&content);
    tracing::debug!(count = profiles.len(), "Found role profiles in {}", path.display());
    Ok(profiles)
}

/// Names of the sections that carry a `role_arn` key, in file order
///
/// The `profile ` prefix used by the shared config format is stripped.
pub fn parse_role_profiles(content: &str) -> Vec<String> {
    let mut profiles = Vec::new();
    let mut section: Option<String> = None;
    let mut has_role = false;

    let mut finish = |section: &mut Option<String>, has_role: &mut bool| {
        if let Some(name) = section.take() {
            if *has_role && !profiles.contains(&name) {
                profiles.push(name);
            }
        }
        *has_role = false;
    };

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            finish(&mut section, &mut has_role);
            let header = header.trim();
            let name = header.strip_prefix("profile ").unwrap_or(header).trim();
            section = Some(name.to_string());
            continue;
        }

        if let Some((key, _)) = line.split_once('=') {
            if key.trim() == "role_arn" {
                has_role = true;
            }
        }
    }
    finish(&mut section, &mut has_role);

    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[default]
region = ap-northeast-1

[profile dev]
role_arn = arn:aws:iam::111111111111:role/dev
source_profile = default

; comment
[profile  prod ]
region = us-east-1
role_arn=arn:aws:iam::222222222222:role/admin

[profile plain]
region = us-west-2
"#;

    #[test]
    fn test_parse_role_profiles() {
        assert_eq!(parse_role_profiles(SAMPLE), vec!["dev", "prod"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_role_profiles("").is_empty());
    }

    #[test]
    fn test_list_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, SAMPLE).unwrap();

        assert_eq!(list_role_profiles(&path).unwrap(), vec!["dev", "prod"]);
    }

    #[test]
    fn test_list_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = list_role_profiles(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
