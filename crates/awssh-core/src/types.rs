//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a remote compute node (`i-` followed by 8 or 17 alphanumerics)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId(String);

/// Rejection reason for a malformed target identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTargetId(pub String);

impl fmt::Display for InvalidTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unmatched instance-id: {}", self.0)
    }
}

impl std::error::Error for InvalidTargetId {}

impl TargetId {
    /// Validate and wrap a target identifier
    pub fn parse(id: &str) -> Result<Self, InvalidTargetId> {
        let suffix = id
            .strip_prefix("i-")
            .ok_or_else(|| InvalidTargetId(id.to_string()))?;

        let well_formed = matches!(suffix.len(), 8 | 17)
            && suffix.chars().all(|c| c.is_ascii_alphanumeric());

        if well_formed {
            Ok(Self(id.to_string()))
        } else {
            Err(InvalidTargetId(id.to_string()))
        }
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TargetId {
    type Err = InvalidTargetId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TargetId {
    type Error = InvalidTargetId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TargetId> for String {
    fn from(id: TargetId) -> Self {
        id.0
    }
}

/// A resolved, live target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Target identifier
    pub id: TargetId,
    /// Value of the `Name` tag, if any
    pub name: Option<String>,
    /// Network placement (availability zone) needed to push credentials
    pub placement: Option<String>,
}

impl Target {
    /// Create a target with no name and unknown placement
    pub fn new(id: TargetId) -> Self {
        Self {
            id,
            name: None,
            placement: None,
        }
    }

    /// Set the network placement
    pub fn with_placement(mut self, placement: impl Into<String>) -> Self {
        self.placement = Some(placement.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_long_and_short_ids() {
        assert!(TargetId::parse("i-0123456789abcdef0").is_ok());
        assert!(TargetId::parse("i-01234567").is_ok());
    }

    #[test]
    fn test_rejects_malformed_ids() {
        for bad in [
            "",
            "i-",
            "0123456789abcdef0",
            "i-0123456",
            "i-0123456789abcdef",
            "i-0123456789abcdef01",
            "i-0123-567",
            "x-01234567",
        ] {
            assert!(TargetId::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_invalid_id_message() {
        let err = TargetId::parse("web-1").unwrap_err();
        assert_eq!(err.to_string(), "unmatched instance-id: web-1");
    }

    #[test]
    fn test_serde_validates() {
        let id: TargetId = serde_json::from_str(r#""i-0123456789abcdef0""#).unwrap();
        assert_eq!(id.as_str(), "i-0123456789abcdef0");
        assert!(serde_json::from_str::<TargetId>(r#""bogus""#).is_err());
    }
}
