//! forge
//!
//! Abstraction for remote forges that host pull requests and releases.
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface for interacting with the remote
//! hosting service. The publish pipeline uses the [`create_forge`] factory
//! rather than importing a specific implementation directly, so tests can
//! substitute [`mock::MockForge`].
//!
//! Forge operations run only after local preconditions are satisfied; a
//! forge failure never leaves the local repository in a worse state than
//! before the call.
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Mock implementation for deterministic testing

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;

use github::{parse_github_url, GitHubForge};

/// Create a forge from a remote URL and token.
///
/// Only GitHub remotes are recognized; other hosts return
/// `ForgeError::NotFound` with the URL in the message.
pub fn create_forge(remote_url: &str, token: String) -> Result<Box<dyn Forge>, ForgeError> {
    match parse_github_url(remote_url) {
        Some((owner, repo)) => Ok(Box::new(GitHubForge::new(token, owner, repo))),
        None => Err(ForgeError::NotFound(format!(
            "no supported forge for remote '{}'",
            remote_url
        ))),
    }
}

/// Read the forge token from the environment.
///
/// Checks `GITHUB_TOKEN`, then `GH_TOKEN`.
pub fn token_from_env() -> Result<String, ForgeError> {
    std::env::var("GITHUB_TOKEN")
        .or_else(|_| std::env::var("GH_TOKEN"))
        .map_err(|_| ForgeError::AuthRequired)
}
