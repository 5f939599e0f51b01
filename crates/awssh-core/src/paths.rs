//! Path helpers for key material

use std::path::{Path, PathBuf};

/// Suffix appended to an identity file to locate its public half
pub const PUBLIC_KEY_SUFFIX: &str = ".pub";

/// Expand a leading `~` to the current user's home directory
///
/// Paths without the shorthand, and `~user` forms, are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Public key path to push for a session
///
/// An explicit path wins; otherwise the identity file path with
/// [`PUBLIC_KEY_SUFFIX`] appended.
pub fn public_key_path(identity_file: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let mut derived = identity_file.as_os_str().to_owned();
            derived.push(PUBLIC_KEY_SUFFIX);
            PathBuf::from(derived)
        }
    }
}
