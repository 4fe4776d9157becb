//! forge::traits
//!
//! Forge trait definition for interacting with the remote repository API.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully.
//!
//! The trait is deliberately thin: it exposes single API calls (find a PR,
//! list check runs, create a release) and leaves policy - polling loops,
//! retry bounds, conflict classification - to the release layer. That keeps
//! the orchestration state machine testable against [`crate::forge::MockForge`]
//! without any timing behavior hidden inside the adapter.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required (set GITHUB_TOKEN or GH_TOKEN)")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    ///
    /// For release creation this is the eventual-consistency signal: the
    /// pushed tag has not propagated to the API yet.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ForgeError {
    /// Whether this error means a pushed ref has not propagated yet.
    ///
    /// Only `NotFound` qualifies; everything else is treated conservatively
    /// as a real failure and never retried.
    pub fn is_propagation_lag(&self) -> bool {
        matches!(self, ForgeError::NotFound(_))
    }
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR URL (web URL for viewing)
    pub url: String,
    /// PR state (open, closed, merged)
    pub state: PrState,
    /// Head branch name
    pub head: String,
    /// Head commit SHA (check runs are keyed by this)
    pub head_sha: String,
    /// Base branch name
    pub base: String,
    /// PR title
    pub title: String,
}

/// PR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    /// PR is open and awaiting checks/merge
    Open,
    /// PR is closed without being merged
    Closed,
    /// PR has been merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Merge method for merging a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits and merge
    #[default]
    Squash,
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeMethod::Merge => write!(f, "merge"),
            MergeMethod::Squash => write!(f, "squash"),
        }
    }
}

/// Completion state of a single CI check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Not started yet
    Queued,
    /// Running
    InProgress,
    /// Finished (consult the conclusion)
    Completed,
}

/// Conclusion of a completed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
}

impl CheckConclusion {
    /// Whether this conclusion counts as passing.
    pub fn is_passing(&self) -> bool {
        matches!(
            self,
            CheckConclusion::Success | CheckConclusion::Neutral | CheckConclusion::Skipped
        )
    }
}

/// A single CI check run attached to a commit.
#[derive(Debug, Clone)]
pub struct CheckRun {
    /// Check name as reported by the forge
    pub name: String,
    /// Completion state
    pub status: CheckStatus,
    /// Conclusion, present once `status` is `Completed`
    pub conclusion: Option<CheckConclusion>,
}

/// Aggregate view over a set of check runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksVerdict {
    /// No checks reported at all
    None,
    /// At least one check is queued or running
    Pending,
    /// All checks completed and passed
    Passed,
    /// At least one check completed and failed (names attached)
    Failed(Vec<String>),
}

/// Summarize a set of check runs into a verdict.
///
/// A failure verdict wins over pending: once any check has failed there
/// is no point waiting for the rest.
pub fn summarize_checks(checks: &[CheckRun]) -> ChecksVerdict {
    if checks.is_empty() {
        return ChecksVerdict::None;
    }

    let failed: Vec<String> = checks
        .iter()
        .filter(|c| {
            c.status == CheckStatus::Completed
                && c.conclusion.map(|con| !con.is_passing()).unwrap_or(true)
        })
        .map(|c| c.name.clone())
        .collect();
    if !failed.is_empty() {
        return ChecksVerdict::Failed(failed);
    }

    if checks.iter().any(|c| c.status != CheckStatus::Completed) {
        return ChecksVerdict::Pending;
    }

    ChecksVerdict::Passed
}

/// A created release record.
#[derive(Debug, Clone)]
pub struct ReleaseRecord {
    /// Release identifier assigned by the forge
    pub id: u64,
    /// Web URL of the release
    pub url: String,
    /// Tag the release is attached to
    pub tag: String,
}

/// A workflow run triggered by a release event.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    /// Workflow name
    pub name: String,
    /// Completion state
    pub status: CheckStatus,
    /// Conclusion, present once completed
    pub conclusion: Option<CheckConclusion>,
}

/// The Forge trait for interacting with the remote repository API.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Find an open pull request by head branch.
    ///
    /// At most one open PR per head branch is assumed; this lookup is what
    /// makes publish re-invocation idempotent (resume instead of creating
    /// a duplicate).
    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError>;

    /// Get a pull request by number.
    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError>;

    /// Create a new pull request.
    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Merge a pull request.
    ///
    /// # Errors
    ///
    /// A non-mergeable PR surfaces as `ApiError` with the HTTP status the
    /// forge uses for that condition (405/409 on GitHub); the release layer
    /// classifies it, this adapter does not.
    async fn merge_pr(
        &self,
        number: u64,
        method: MergeMethod,
        delete_branch: bool,
    ) -> Result<(), ForgeError>;

    /// List CI check runs for a commit.
    async fn list_checks(&self, sha: &str) -> Result<Vec<CheckRun>, ForgeError>;

    /// Whether the repository has any check-triggering automation at all.
    ///
    /// When false, waiting for checks is skipped entirely rather than
    /// blocking on checks that will never report.
    async fn has_check_automation(&self) -> Result<bool, ForgeError>;

    /// Create a release record for an existing tag.
    ///
    /// # Errors
    ///
    /// `NotFound` when the tag has not propagated to the API yet; the
    /// release layer retries that case with a bounded backoff.
    async fn create_release(
        &self,
        tag: &str,
        title: &str,
        body: &str,
    ) -> Result<ReleaseRecord, ForgeError>;

    /// Close the milestone whose title equals `version` (bare, no "v").
    ///
    /// Returns `false` when no such open milestone exists. Failures here
    /// never fail a publish; callers log and continue.
    async fn close_milestone(&self, version: &str) -> Result<bool, ForgeError>;

    /// List workflow runs triggered by a release of `tag`.
    async fn release_workflow_runs(&self, tag: &str) -> Result<Vec<WorkflowRun>, ForgeError>;
}
