//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$SLIPWAY_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/slipway/config.toml`
//! 3. `~/.slipway/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `slipway.toml` in the repository root. This is where the
//! branch policy lives: which target branch a working branch promotes
//! onto, and how the version increments for that promotion.
//!
//! # Validation
//!
//! Config values are validated after parsing (branch names must be valid
//! refnames, timeouts must be positive).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// interactive = true
/// remote = "origin"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default interactive mode
    pub interactive: Option<bool>,

    /// Default remote name
    pub remote: Option<String>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote name cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Version increment level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Increment {
    /// Bump the patch component
    Patch,
    /// Bump the minor component, zero patch
    Minor,
    /// Bump the major component, zero minor and patch
    Major,
}

impl std::fmt::Display for Increment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Increment::Patch => write!(f, "patch"),
            Increment::Minor => write!(f, "minor"),
            Increment::Major => write!(f, "major"),
        }
    }
}

/// Merge strategy for the promotion pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Squash all commits and merge (default; histories diverge afterwards)
    #[default]
    Squash,
    /// Create a merge commit
    Merge,
}

/// Per-branch release policy.
///
/// Keyed by working-branch name in `[branches.<name>]`. The `target` is
/// the branch this working branch promotes onto; `tag` and `increment`
/// apply when this branch is the *target* of a promotion, so that several
/// working branches converge on one correctly-tagged release line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyEntry {
    /// Branch releases from this branch are promoted onto
    pub target: Option<BranchName>,

    /// Prerelease tag applied to versions released onto this branch
    /// (e.g. "beta" yields `1.3.0-beta.0`). Absent means stable releases.
    pub tag: Option<String>,

    /// Increment level for versions released onto this branch
    pub increment: Option<Increment>,
}

/// The full branch policy: working branch name to policy entry.
///
/// Immutable during a run; loaded once from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchPolicy {
    entries: BTreeMap<BranchName, PolicyEntry>,
}

impl BranchPolicy {
    /// Build a policy from config entries.
    pub fn new(entries: BTreeMap<BranchName, PolicyEntry>) -> Self {
        Self { entries }
    }

    /// Look up the policy entry for a branch.
    pub fn entry(&self, branch: &BranchName) -> Option<&PolicyEntry> {
        self.entries.get(branch)
    }

    /// Whether any branch-dependent policy is configured at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check-wait settings for the pull request and release workflow waits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    /// Maximum seconds to wait for checks before giving up
    pub timeout_secs: u64,

    /// Seconds between polls of the remote API
    pub poll_interval_secs: u64,

    /// Whether to wait for release-triggered workflows after publishing
    pub wait_for_release_workflows: bool,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            poll_interval_secs: 15,
            wait_for_release_workflows: false,
        }
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "origin"
/// target = "main"
/// manifest = "package.json"
/// merge_strategy = "squash"
/// verify_command = "npm test"
/// install_command = "npm ci"
/// required_env = ["GITHUB_TOKEN"]
///
/// [checks]
/// timeout_secs = 600
/// poll_interval_secs = 15
///
/// [branches.develop]
/// target = "main"
///
/// [branches.main]
/// increment = "patch"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote name (default: "origin")
    pub remote: Option<String>,

    /// Default target branch when no branch policy applies (default: "main")
    pub target: Option<BranchName>,

    /// Manifest file name (default: "package.json"). This is the only
    /// file on the merge-conflict allow-list.
    pub manifest: Option<String>,

    /// Merge strategy for the promotion PR
    pub merge_strategy: Option<MergeStrategy>,

    /// Pre-flight verification command (must be declared to publish)
    pub verify_command: Option<String>,

    /// Dependency installation command, run after manifest conflicts are
    /// auto-resolved and before the release commit
    pub install_command: Option<String>,

    /// Environment variables that must be present to publish
    pub required_env: Option<Vec<String>>,

    /// Check-wait settings
    pub checks: Option<ChecksConfig>,

    /// Per-branch release policy
    pub branches: BTreeMap<BranchName, PolicyEntry>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote name cannot be empty".into(),
                ));
            }
        }
        if let Some(manifest) = &self.manifest {
            if manifest.is_empty() || manifest.contains('/') {
                return Err(ConfigError::InvalidValue(
                    "manifest must be a bare file name at the repository root".into(),
                ));
            }
        }
        if let Some(checks) = &self.checks {
            if checks.poll_interval_secs == 0 {
                return Err(ConfigError::InvalidValue(
                    "checks.poll_interval_secs must be positive".into(),
                ));
            }
            if checks.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue(
                    "checks.timeout_secs must be positive".into(),
                ));
            }
        }
        for (branch, entry) in &self.branches {
            if let Some(tag) = &entry.tag {
                if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    return Err(ConfigError::InvalidValue(format!(
                        "branches.{}.tag must be alphanumeric (got '{}')",
                        branch, tag
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_config_parses_full_example() {
        let toml = r#"
            remote = "origin"
            target = "main"
            manifest = "package.json"
            merge_strategy = "squash"
            verify_command = "npm test"
            required_env = ["GITHUB_TOKEN"]

            [checks]
            timeout_secs = 300
            poll_interval_secs = 10
            wait_for_release_workflows = true

            [branches.develop]
            target = "main"

            [branches.main]
            increment = "patch"

            [branches.beta]
            tag = "beta"
            increment = "minor"
        "#;

        let config: RepoConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.remote.as_deref(), Some("origin"));
        assert_eq!(config.merge_strategy, Some(MergeStrategy::Squash));
        assert_eq!(config.checks.as_ref().unwrap().timeout_secs, 300);

        let develop = BranchName::new("develop").unwrap();
        let entry = config.branches.get(&develop).unwrap();
        assert_eq!(entry.target, Some(BranchName::new("main").unwrap()));

        let beta = BranchName::new("beta").unwrap();
        let entry = config.branches.get(&beta).unwrap();
        assert_eq!(entry.tag.as_deref(), Some("beta"));
        assert_eq!(entry.increment, Some(Increment::Minor));
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<RepoConfig, _> = toml::from_str("unknown_key = 1");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_branch_key_rejected() {
        let result: Result<RepoConfig, _> = toml::from_str("[branches.\"-bad\"]\ntarget = \"main\"");
        assert!(result.is_err());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config: RepoConfig = toml::from_str(
            "[checks]\ntimeout_secs = 60\npoll_interval_secs = 0\nwait_for_release_workflows = false",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn manifest_with_path_separator_rejected() {
        let config: RepoConfig = toml::from_str("manifest = \"sub/package.json\"").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn policy_lookup() {
        let mut entries = BTreeMap::new();
        entries.insert(
            BranchName::new("develop").unwrap(),
            PolicyEntry {
                target: Some(BranchName::new("main").unwrap()),
                tag: None,
                increment: None,
            },
        );
        let policy = BranchPolicy::new(entries);

        assert!(policy.entry(&BranchName::new("develop").unwrap()).is_some());
        assert!(policy.entry(&BranchName::new("other").unwrap()).is_none());
        assert!(!policy.is_empty());
        assert!(BranchPolicy::default().is_empty());
    }

    #[test]
    fn increment_display() {
        assert_eq!(Increment::Patch.to_string(), "patch");
        assert_eq!(Increment::Minor.to_string(), "minor");
        assert_eq!(Increment::Major.to_string(), "major");
    }
}
