//! manifest
//!
//! Reading and writing the package manifest (`package.json` by default).
//!
//! # Design
//!
//! The manifest is parsed into a `serde_json::Value` rather than a typed
//! struct so that unknown fields survive a read-modify-write cycle
//! untouched. With serde_json's `preserve_order` feature the key order is
//! kept too, which keeps version-bump diffs down to the single changed
//! line.
//!
//! # Example
//!
//! ```
//! use slipway::manifest::Manifest;
//!
//! let mut manifest = Manifest::from_str(
//!     r#"{"name": "my-pkg", "version": "1.2.3"}"#,
//! ).unwrap();
//! assert_eq!(manifest.name().unwrap(), "my-pkg");
//! assert_eq!(manifest.version().unwrap().to_string(), "1.2.3");
//!
//! manifest.set_version(&"1.3.0".parse().unwrap()).unwrap();
//! assert_eq!(manifest.version().unwrap().to_string(), "1.3.0");
//! ```

use semver::Version;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid JSON.
    #[error("manifest is not valid JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A required field is missing or has the wrong type.
    #[error("manifest is missing required field '{0}'")]
    MissingField(&'static str),

    /// The version field is not a valid semantic version.
    #[error("manifest version '{version}' is not valid semver: {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    /// The manifest file could not be written.
    #[error("failed to write manifest at {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An in-memory package manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: Option<PathBuf>,
    data: Value,
}

impl Manifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::from_str(&content)?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Parse a manifest from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let data: Value = serde_json::from_str(content)?;
        Ok(Self { path: None, data })
    }

    /// Package name.
    pub fn name(&self) -> Result<&str, ManifestError> {
        self.data
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("name"))
    }

    /// Package version, parsed as semver.
    pub fn version(&self) -> Result<Version, ManifestError> {
        let raw = self.version_str()?;
        raw.parse().map_err(|source| ManifestError::InvalidVersion {
            version: raw.to_string(),
            source,
        })
    }

    /// Raw version string.
    pub fn version_str(&self) -> Result<&str, ManifestError> {
        self.data
            .get("version")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("version"))
    }

    /// Replace the version field. All other fields are untouched.
    pub fn set_version(&mut self, version: &Version) -> Result<(), ManifestError> {
        let object = self
            .data
            .as_object_mut()
            .ok_or(ManifestError::MissingField("version"))?;
        object.insert("version".to_string(), Value::String(version.to_string()));
        Ok(())
    }

    /// Look up a script by name under the `scripts` object.
    pub fn script(&self, name: &str) -> Option<&str> {
        self.data.get("scripts")?.get(name)?.as_str()
    }

    /// Serialize with a trailing newline, matching npm's formatting.
    pub fn to_json_string(&self) -> Result<String, ManifestError> {
        let mut rendered = serde_json::to_string_pretty(&self.data)?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Write back to the path the manifest was loaded from.
    pub fn write(&self) -> Result<(), ManifestError> {
        let path = self
            .path
            .as_ref()
            .ok_or(ManifestError::MissingField("path"))?;
        let rendered = self.to_json_string()?;
        std::fs::write(path, rendered).map_err(|source| ManifestError::WriteError {
            path: path.clone(),
            source,
        })
    }
}

/// Compare two manifest texts structurally, ignoring the top-level
/// version field and formatting differences.
///
/// Used to decide whether a diff that touches only the manifest is a pure
/// version bump (no release needed) or carries real changes.
pub fn equal_ignoring_version(a: &str, b: &str) -> Result<bool, ManifestError> {
    let mask = |content: &str| -> Result<Value, ManifestError> {
        let mut value: Value = serde_json::from_str(content)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("version");
        }
        Ok(value)
    };
    Ok(mask(a)? == mask(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
  "name": "my-pkg",
  "version": "1.2.3",
  "scripts": {
    "test": "vitest run",
    "build": "tsc"
  },
  "dependencies": {
    "left-pad": "^1.0.0"
  }
}
"#;

    #[test]
    fn parse_name_and_version() {
        let manifest = Manifest::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.name().unwrap(), "my-pkg");
        assert_eq!(manifest.version().unwrap(), Version::new(1, 2, 3));
        assert_eq!(manifest.script("test"), Some("vitest run"));
        assert_eq!(manifest.script("lint"), None);
    }

    #[test]
    fn missing_fields() {
        let manifest = Manifest::from_str("{}").unwrap();
        assert!(matches!(
            manifest.name(),
            Err(ManifestError::MissingField("name"))
        ));
        assert!(matches!(
            manifest.version(),
            Err(ManifestError::MissingField("version"))
        ));
    }

    #[test]
    fn invalid_version() {
        let manifest = Manifest::from_str(r#"{"version": "not-semver"}"#).unwrap();
        assert!(matches!(
            manifest.version(),
            Err(ManifestError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn set_version_preserves_other_fields_and_order() {
        let mut manifest = Manifest::from_str(SAMPLE).unwrap();
        manifest.set_version(&Version::new(1, 3, 0)).unwrap();

        let rendered = manifest.to_json_string().unwrap();
        assert!(rendered.contains(r#""version": "1.3.0""#));
        assert!(rendered.contains("left-pad"));
        // Name still comes before version.
        let name_pos = rendered.find("\"name\"").unwrap();
        let version_pos = rendered.find("\"version\"").unwrap();
        assert!(name_pos < version_pos);
    }

    #[test]
    fn load_and_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut manifest = Manifest::load(&path).unwrap();
        manifest.set_version(&Version::new(2, 0, 0)).unwrap();
        manifest.write().unwrap();

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.version().unwrap(), Version::new(2, 0, 0));
        assert_eq!(reloaded.script("build"), Some("tsc"));
    }

    #[test]
    fn equal_ignoring_version_pure_bump() {
        let before = r#"{"name": "p", "version": "1.0.0", "dependencies": {}}"#;
        let after = r#"{"name": "p", "version": "1.0.1", "dependencies": {}}"#;
        assert!(equal_ignoring_version(before, after).unwrap());
    }

    #[test]
    fn equal_ignoring_version_real_change() {
        let before = r#"{"name": "p", "version": "1.0.0"}"#;
        let after = r#"{"name": "p", "version": "1.0.1", "dependencies": {"x": "1"}}"#;
        assert!(!equal_ignoring_version(before, after).unwrap());
    }

    #[test]
    fn equal_ignoring_version_formatting_only() {
        let before = "{\"name\":\"p\",\"version\":\"1.0.0\"}";
        let after = "{\n  \"name\": \"p\",\n  \"version\": \"1.0.0\"\n}\n";
        assert!(equal_ignoring_version(before, after).unwrap());
    }
}
