//! release
//!
//! The publication pipeline: version resolution, branch synchronization,
//! release necessity, tag and release creation, PR lifecycle, and the
//! top-level orchestrator that sequences them.
//!
//! # Architecture
//!
//! Each stage is a standalone module with its own narrow contract:
//!
//! - [`resolver`]: pure computation of the next version from policy
//! - [`sync`]: bring a branch into agreement with its remote counterpart
//! - [`necessity`]: decide whether there is anything worth publishing
//! - [`tag`]: idempotent tag and release-record creation
//! - [`pr`]: find-or-create the promotion PR, wait for checks, merge
//! - [`orchestrator`]: the end-to-end sequence, resumable after failure
//!
//! The pipeline carries no state between invocations. Every run re-derives
//! where it is from authoritative sources (current branch, existing tags,
//! open PRs, registry contents), which is what makes re-invocation after a
//! partial failure safe.

pub mod necessity;
pub mod orchestrator;
pub mod pr;
pub mod resolver;
pub mod sync;
pub mod tag;

pub use necessity::ReleaseNecessity;
pub use orchestrator::{PublishOutcome, PublishRequest, Publisher};
pub use resolver::{Resolution, VersionSpec};
pub use sync::SyncResult;

use crate::core::config::ConfigError;
use crate::core::lock::LockError;
use crate::forge::ForgeError;
use crate::git::GitError;
use crate::manifest::ManifestError;
use crate::registry::RegistryError;
use thiserror::Error;

/// Errors from the publication pipeline.
///
/// Every fatal variant names the step that failed and, where the operator
/// can fix the condition and re-run, says how. Re-running is always safe:
/// the pipeline re-derives its position from external state.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A structural precondition failed before any mutation.
    #[error("precondition failed at {step}: {message}")]
    Precondition { step: &'static str, message: String },

    /// A version spec argument was not one of patch/minor/major or a
    /// well-formed semantic version.
    #[error(
        "invalid version spec '{0}': expected 'patch', 'minor', 'major', \
         or an explicit version like '1.2.3' or '1.2.3-beta.1'"
    )]
    InvalidVersionSpec(String),

    /// Merging remote changes hit conflicts outside the manifest.
    #[error(
        "sync of '{branch}' hit conflicts that cannot be auto-resolved: {}\n\
         Resolve the conflicts manually, push, and re-run.",
        .files.join(", ")
    )]
    SyncConflict { branch: String, files: Vec<String> },

    /// The version is already published; nothing to do unless the run
    /// explicitly asked to treat this as success.
    #[error(
        "version {version} is already published (tag {tag} exists and the registry reports it).\n\
         Bump the version, or pass --skip-if-published to treat this as success."
    )]
    DuplicateVersion { version: String, tag: String },

    /// A tag exists for a version the registry does not know, left behind
    /// by an interrupted run.
    #[error(
        "tag {tag} exists but version {version} is not published, likely an interrupted \
         prior run.\nInspect the tag, then either delete it or re-run with --force-republish \
         to delete and re-create it."
    )]
    TagConflict { version: String, tag: String },

    /// One or more CI checks concluded with failure.
    #[error(
        "checks failed on the release PR: {}\n\
         Fix the failures, push, and re-run; the open PR will be reused.",
        .checks.join(", ")
    )]
    ChecksFailed { checks: Vec<String> },

    /// CI checks did not finish within the configured timeout.
    #[error(
        "timed out after {seconds}s waiting for checks.\n\
         Re-run once checks finish, or raise checks.timeout_secs."
    )]
    ChecksTimeout { seconds: u64 },

    /// The forge refused to merge the PR (non-mergeable state).
    #[error(
        "PR #{number} is not mergeable (conflicts with the base branch).\n\
         Resolve the conflicts on the PR, then re-run; the pipeline resumes at the merge."
    )]
    PrConflict { number: u64 },

    /// The pushed tag never became visible to the forge API.
    #[error(
        "release creation gave up after {attempts} attempts: the forge does not see tag {tag} \
         yet.\nThe tag is pushed; re-run in a moment to create the release record."
    )]
    TagPropagationTimeout { tag: String, attempts: u32 },

    /// The operator declined an interactive confirmation.
    #[error("aborted by operator at {step}")]
    Aborted { step: &'static str },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_remediation() {
        let err = PublishError::TagConflict {
            version: "2.0.0".to_string(),
            tag: "v2.0.0".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("v2.0.0"));
        assert!(message.contains("--force-republish"));

        let err = PublishError::SyncConflict {
            branch: "develop".to_string(),
            files: vec!["src/lib.rs".to_string(), "README.md".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("src/lib.rs, README.md"));
    }

    #[test]
    fn wrapped_errors_pass_through() {
        let err: PublishError = GitError::NotARepo {
            path: "/tmp/x".into(),
        }
        .into();
        assert!(matches!(err, PublishError::Git(_)));
    }
}
