//! registry
//!
//! Package registry queries for the published-version check.
//!
//! # Design
//!
//! A `Registry` trait with one question: what version of a package is
//! currently published? The npm implementation hits the registry's
//! `/{package}/latest` endpoint; the mock stores versions in memory for
//! tests. The pipeline compares the registry answer against a local tag
//! to distinguish an already-published version from a tag left behind by
//! an interrupted run.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Default npm registry base URL.
const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmjs.org";

/// Errors from registry queries.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The registry returned an unexpected status.
    #[error("registry returned HTTP {status} for '{package}'")]
    ApiError { package: String, status: u16 },

    /// Network-level failure (timeout, DNS, connection refused).
    #[error("registry request failed: {0}")]
    NetworkError(String),

    /// The registry response could not be parsed.
    #[error("invalid registry response for '{package}': {message}")]
    InvalidResponse { package: String, message: String },
}

/// A package registry that can report the latest published version.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Latest published version of `package`, or `None` if the package
    /// has never been published.
    async fn published_version(&self, package: &str) -> Result<Option<String>, RegistryError>;
}

/// npm registry client.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    version: String,
}

impl Default for NpmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NpmRegistry {
    /// Create a client against the public npm registry.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_NPM_REGISTRY)
    }

    /// Create a client against a custom registry URL (private registries,
    /// mock servers in tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl Registry for NpmRegistry {
    async fn published_version(&self, package: &str) -> Result<Option<String>, RegistryError> {
        // Scoped package names contain '/', which must be encoded.
        let encoded = package.replace('/', "%2F");
        let url = format!("{}/{}/latest", self.base_url, encoded);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::NetworkError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let latest: LatestResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| RegistryError::InvalidResponse {
                            package: package.to_string(),
                            message: e.to_string(),
                        })?;
                Ok(Some(latest.version))
            }
            status => Err(RegistryError::ApiError {
                package: package.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// In-memory registry for tests.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    versions: Arc<Mutex<HashMap<String, String>>>,
    fail: Arc<Mutex<Option<RegistryError>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the published version for a package.
    pub fn publish(&self, package: impl Into<String>, version: impl Into<String>) {
        self.versions
            .lock()
            .unwrap()
            .insert(package.into(), version.into());
    }

    /// Make subsequent queries fail with the given error.
    pub fn fail_with(&self, error: RegistryError) {
        *self.fail.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn published_version(&self, package: &str) -> Result<Option<String>, RegistryError> {
        if let Some(error) = self.fail.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.versions.lock().unwrap().get(package).cloned())
    }
}
