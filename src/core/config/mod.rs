//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Slipway has two configuration scopes:
//! - **Global**: user-level defaults
//! - **Repo**: repository-level settings, including the branch policy
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config file
//! 3. Repo config file (`slipway.toml` at the repository root)
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$SLIPWAY_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/slipway/config.toml`
//! 3. `~/.slipway/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use slipway::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo"))).unwrap();
//! println!("remote: {}", config.remote());
//! println!("target: {}", config.default_target());
//! ```

pub mod schema;

pub use schema::{
    BranchPolicy, ChecksConfig, GlobalConfig, Increment, MergeStrategy, PolicyEntry, RepoConfig,
};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::BranchName;

/// Name of the repo config file, at the repository root.
pub const REPO_CONFIG_FILE: &str = "slipway.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration with precedence applied.
#[derive(Debug, Clone, Default)]
pub struct Config {
    global: GlobalConfig,
    repo: RepoConfig,
}

impl Config {
    /// Load and merge global and repo configuration.
    ///
    /// `repo_root` is the working directory of the repository; when `None`,
    /// only global configuration is loaded. Both files are optional -
    /// defaults apply where nothing is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unreadable or invalid files. A *missing*
    /// file is not an error.
    pub fn load(repo_root: Option<&Path>) -> Result<Self, ConfigError> {
        let global = match global_config_path() {
            Some(path) if path.exists() => {
                let config: GlobalConfig = read_toml(&path)?;
                config.validate()?;
                config
            }
            _ => GlobalConfig::default(),
        };

        let repo = match repo_root {
            Some(root) => {
                let path = root.join(REPO_CONFIG_FILE);
                if path.exists() {
                    let config: RepoConfig = read_toml(&path)?;
                    config.validate()?;
                    config
                } else {
                    RepoConfig::default()
                }
            }
            None => RepoConfig::default(),
        };

        Ok(Self { global, repo })
    }

    /// Build a config directly from parts (used by tests).
    pub fn from_parts(global: GlobalConfig, repo: RepoConfig) -> Self {
        Self { global, repo }
    }

    /// Remote name, default "origin".
    pub fn remote(&self) -> &str {
        self.repo
            .remote
            .as_deref()
            .or(self.global.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Default target branch when no branch policy applies.
    pub fn default_target(&self) -> BranchName {
        self.repo
            .target
            .clone()
            .unwrap_or_else(|| BranchName::new("main").expect("static name"))
    }

    /// Manifest file name, default "package.json".
    pub fn manifest(&self) -> &str {
        self.repo.manifest.as_deref().unwrap_or("package.json")
    }

    /// Merge strategy for the promotion PR.
    pub fn merge_strategy(&self) -> MergeStrategy {
        self.repo.merge_strategy.unwrap_or_default()
    }

    /// Pre-flight verification command, if declared.
    pub fn verify_command(&self) -> Option<&str> {
        self.repo.verify_command.as_deref()
    }

    /// Dependency installation command, if declared.
    pub fn install_command(&self) -> Option<&str> {
        self.repo.install_command.as_deref()
    }

    /// Environment variables that must be present to publish.
    pub fn required_env(&self) -> Vec<String> {
        self.repo
            .required_env
            .clone()
            .unwrap_or_else(|| vec!["GITHUB_TOKEN".to_string()])
    }

    /// Check-wait settings.
    pub fn checks(&self) -> ChecksConfig {
        self.repo.checks.clone().unwrap_or_default()
    }

    /// Interactive default from global config, if set.
    pub fn interactive(&self) -> Option<bool> {
        self.global.interactive
    }

    /// The branch policy.
    pub fn policy(&self) -> BranchPolicy {
        BranchPolicy::new(self.repo.branches.clone())
    }
}

/// Find the global config path, honoring `$SLIPWAY_CONFIG`.
fn global_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SLIPWAY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        let path = PathBuf::from(config_home).join("slipway").join("config.toml");
        if path.exists() {
            return Some(path);
        }
    }
    dirs::home_dir().map(|home| home.join(".slipway").join("config.toml"))
}

/// Read and parse a TOML file into a config type.
fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_any_files() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(Some(temp.path())).unwrap();

        assert_eq!(config.remote(), "origin");
        assert_eq!(config.default_target().as_str(), "main");
        assert_eq!(config.manifest(), "package.json");
        assert_eq!(config.merge_strategy(), MergeStrategy::Squash);
        assert!(config.verify_command().is_none());
        assert_eq!(config.required_env(), vec!["GITHUB_TOKEN".to_string()]);
        assert!(config.policy().is_empty());
    }

    #[test]
    fn repo_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(REPO_CONFIG_FILE),
            r#"
                remote = "upstream"
                target = "stable"
                manifest = "package.json"
                verify_command = "npm test"

                [branches.develop]
                target = "stable"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(temp.path())).unwrap();
        assert_eq!(config.remote(), "upstream");
        assert_eq!(config.default_target().as_str(), "stable");
        assert_eq!(config.verify_command(), Some("npm test"));

        let develop = BranchName::new("develop").unwrap();
        let policy = config.policy();
        let entry = policy.entry(&develop).unwrap();
        assert_eq!(entry.target.as_ref().unwrap().as_str(), "stable");
    }

    #[test]
    fn malformed_repo_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(REPO_CONFIG_FILE), "remote = [not toml").unwrap();

        let result = Config::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn from_parts_applies_precedence() {
        let global = GlobalConfig {
            remote: Some("global-remote".into()),
            interactive: Some(false),
        };
        let repo = RepoConfig {
            remote: Some("repo-remote".into()),
            ..Default::default()
        };

        let config = Config::from_parts(global, repo);
        assert_eq!(config.remote(), "repo-remote");
        assert_eq!(config.interactive(), Some(false));
    }
}
