//! core::types
//!
//! Validated domain types shared across layers.
//!
//! # Design
//!
//! Branch names cross a trust boundary: they come from configuration files
//! and CLI arguments and end up as arguments to git subprocesses. Validating
//! them once at construction means the rest of the crate can pass `&BranchName`
//! around without re-checking, and no branch name that could be mistaken for
//! a flag (leading `-`) ever reaches an argv.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Clone, Error)]
pub enum TypeError {
    /// Branch name violates git refname rules.
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),
}

/// A validated git branch name.
///
/// # Example
///
/// ```
/// use slipway::core::types::BranchName;
///
/// let branch = BranchName::new("develop").unwrap();
/// assert_eq!(branch.as_str(), "develop");
/// assert!(BranchName::new("-oops").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates git's
    /// refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Validate a branch name against git's refname rules.
    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '.' or '-'".into(),
            ));
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '.lock' or '/'".into(),
            ));
        }
        if name.contains("..") || name.contains("@{") || name.contains("//") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain '..', '@{' or '//'".into(),
            ));
        }
        for c in name.chars() {
            if c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\')
            {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name contains forbidden character '{}'",
                    c.escape_default()
                )));
            }
        }
        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_accepted() {
        for name in ["main", "develop", "release/1.2", "feature-x", "v2"] {
            assert!(BranchName::new(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn invalid_names_rejected() {
        for name in [
            "", "@", "-flag", ".hidden", "a..b", "a//b", "end/", "x.lock", "a b", "a:b", "a@{b",
        ] {
            assert!(BranchName::new(name).is_err(), "{} should be invalid", name);
        }
    }

    #[test]
    fn display_round_trips() {
        let branch = BranchName::new("release/2.0").unwrap();
        assert_eq!(branch.to_string(), "release/2.0");
        assert_eq!(branch.as_str(), "release/2.0");
    }

    #[test]
    fn serde_round_trip() {
        let branch = BranchName::new("develop").unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        assert_eq!(json, "\"develop\"");
        let back: BranchName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, branch);
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<BranchName, _> = serde_json::from_str("\"-bad\"");
        assert!(result.is_err());
    }
}
