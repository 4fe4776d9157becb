//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Design
//!
//! Implements the `Forge` trait for GitHub: pull request lookup/creation/
//! merge, check runs, releases, milestones, and workflow runs. All calls
//! go through a small response handler that maps HTTP statuses to typed
//! [`ForgeError`] variants, so callers classify failures structurally
//! instead of matching message text.
//!
//! # Authentication
//!
//! A static bearer token (personal access token or workflow token),
//! normally taken from `GITHUB_TOKEN`.
//!
//! # Rate Limiting
//!
//! Returns `ForgeError::RateLimited` when limits are hit; no automatic
//! retry (the caller owns retry policy).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{
    CheckConclusion, CheckRun, CheckStatus, CreatePrRequest, Forge, ForgeError, MergeMethod,
    PrState, PullRequest, ReleaseRecord, WorkflowRun,
};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "slipway-cli";

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise and for tests)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    /// Create a new GitHub forge.
    ///
    /// # Example
    ///
    /// ```
    /// use slipway::forge::github::GitHubForge;
    ///
    /// let forge = GitHubForge::new("ghp_xxx", "octocat", "hello-world");
    /// assert_eq!(forge.owner(), "octocat");
    /// ```
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a GitHub forge with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise (`https://github.example.com/api/v3`)
    /// and for tests against a local mock server.
    pub fn with_api_base(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
        }
    }

    /// Create a GitHub forge from a remote URL.
    ///
    /// Parses the remote URL to extract owner and repo.
    ///
    /// # Example
    ///
    /// ```
    /// use slipway::forge::github::GitHubForge;
    ///
    /// let forge = GitHubForge::from_remote_url("git@github.com:owner/repo.git", "token");
    /// assert!(forge.is_some());
    /// ```
    pub fn from_remote_url(url: &str, token: impl Into<String>) -> Option<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Some(Self::new(token, owner, repo))
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Handle an API response, mapping error statuses to typed variants.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
        context: &str,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {}", e),
            })
        } else {
            Err(self.classify_error(response, status, context).await)
        }
    }

    /// Handle a response where only the status matters.
    async fn handle_empty_response(
        &self,
        response: Response,
        context: &str,
    ) -> Result<(), ForgeError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.classify_error(response, status, context).await)
        }
    }

    /// Map an error response to a `ForgeError`.
    async fn classify_error(
        &self,
        response: Response,
        status: StatusCode,
        context: &str,
    ) -> ForgeError {
        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "0")
            .unwrap_or(false);

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| status.to_string());

        match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed(message),
            StatusCode::FORBIDDEN if rate_limited => ForgeError::RateLimited,
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(message),
            StatusCode::NOT_FOUND => ForgeError::NotFound(context.to_string()),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }

    fn network_err(e: reqwest::Error) -> ForgeError {
        ForgeError::NetworkError(e.to_string())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PrResponse {
    number: u64,
    html_url: String,
    state: String,
    merged_at: Option<String>,
    title: String,
    head: RefResponse,
    base: RefResponse,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    #[serde(rename = "ref")]
    ref_name: String,
    #[serde(default)]
    sha: String,
}

impl From<PrResponse> for PullRequest {
    fn from(pr: PrResponse) -> Self {
        let state = if pr.merged_at.is_some() {
            PrState::Merged
        } else if pr.state == "open" {
            PrState::Open
        } else {
            PrState::Closed
        };

        PullRequest {
            number: pr.number,
            url: pr.html_url,
            state,
            head: pr.head.ref_name,
            head_sha: pr.head.sha,
            base: pr.base.ref_name,
            title: pr.title,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatePrBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct MergeBody<'a> {
    merge_method: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckRunsResponse {
    check_runs: Vec<CheckRunResponse>,
}

#[derive(Debug, Deserialize)]
struct CheckRunResponse {
    name: String,
    status: String,
    conclusion: Option<String>,
}

impl From<CheckRunResponse> for CheckRun {
    fn from(run: CheckRunResponse) -> Self {
        CheckRun {
            name: run.name,
            status: parse_check_status(&run.status),
            conclusion: run.conclusion.as_deref().map(parse_conclusion),
        }
    }
}

/// Parse a check status string, treating unknown states as in-progress
/// (conservative: keep waiting rather than mis-report completion).
fn parse_check_status(status: &str) -> CheckStatus {
    match status {
        "queued" | "waiting" | "requested" | "pending" => CheckStatus::Queued,
        "completed" => CheckStatus::Completed,
        _ => CheckStatus::InProgress,
    }
}

/// Parse a conclusion string, treating unknown conclusions as failure
/// (conservative: escalate rather than silently pass).
fn parse_conclusion(conclusion: &str) -> CheckConclusion {
    match conclusion {
        "success" => CheckConclusion::Success,
        "neutral" => CheckConclusion::Neutral,
        "skipped" => CheckConclusion::Skipped,
        "cancelled" => CheckConclusion::Cancelled,
        "timed_out" => CheckConclusion::TimedOut,
        _ => CheckConclusion::Failure,
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowsResponse {
    total_count: u64,
}

#[derive(Debug, Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    html_url: String,
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct MilestoneResponse {
    number: u64,
    title: String,
}

#[derive(Debug, Serialize)]
struct CloseMilestoneBody<'a> {
    state: &'a str,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<WorkflowRunResponse>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunResponse {
    name: String,
    status: String,
    conclusion: Option<String>,
    head_branch: Option<String>,
}

// =============================================================================
// Forge implementation
// =============================================================================

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        let url = self.repo_url("pulls");
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&[
                ("head", format!("{}:{}", self.owner, head)),
                ("state", "open".to_string()),
            ])
            .send()
            .await
            .map_err(Self::network_err)?;

        let prs: Vec<PrResponse> = self
            .handle_response(response, &format!("pulls for head '{}'", head))
            .await?;

        Ok(prs.into_iter().next().map(PullRequest::from))
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url(&format!("pulls/{}", number));
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(Self::network_err)?;

        let pr: PrResponse = self
            .handle_response(response, &format!("PR #{}", number))
            .await?;
        Ok(pr.into())
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url("pulls");
        let body = CreatePrBody {
            title: &request.title,
            head: &request.head,
            base: &request.base,
            body: request.body.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(Self::network_err)?;

        let pr: PrResponse = self
            .handle_response(response, &format!("create PR {} -> {}", request.head, request.base))
            .await?;
        Ok(pr.into())
    }

    async fn merge_pr(
        &self,
        number: u64,
        method: MergeMethod,
        delete_branch: bool,
    ) -> Result<(), ForgeError> {
        // Fetch first so the head branch name is known for deletion.
        let pr = if delete_branch {
            Some(self.get_pr(number).await?)
        } else {
            None
        };

        let url = self.repo_url(&format!("pulls/{}/merge", number));
        let body = MergeBody {
            merge_method: match method {
                MergeMethod::Merge => "merge",
                MergeMethod::Squash => "squash",
            },
        };

        let response = self
            .client
            .put(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(Self::network_err)?;

        self.handle_empty_response(response, &format!("merge PR #{}", number))
            .await?;

        // Branch deletion is best-effort; the merge already happened.
        if let Some(pr) = pr {
            let url = self.repo_url(&format!("git/refs/heads/{}", pr.head));
            let _ = self
                .client
                .delete(&url)
                .headers(self.headers())
                .send()
                .await;
        }

        Ok(())
    }

    async fn list_checks(&self, sha: &str) -> Result<Vec<CheckRun>, ForgeError> {
        let url = self.repo_url(&format!("commits/{}/check-runs", sha));
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(Self::network_err)?;

        let runs: CheckRunsResponse = self
            .handle_response(response, &format!("check runs for {}", sha))
            .await?;

        Ok(runs.check_runs.into_iter().map(CheckRun::from).collect())
    }

    async fn has_check_automation(&self) -> Result<bool, ForgeError> {
        let url = self.repo_url("actions/workflows");
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(Self::network_err)?;

        let workflows: WorkflowsResponse =
            self.handle_response(response, "actions workflows").await?;
        Ok(workflows.total_count > 0)
    }

    async fn create_release(
        &self,
        tag: &str,
        title: &str,
        body: &str,
    ) -> Result<ReleaseRecord, ForgeError> {
        let url = self.repo_url("releases");
        let payload = CreateReleaseBody {
            tag_name: tag,
            name: title,
            body,
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&payload)
            .send()
            .await
            .map_err(Self::network_err)?;

        let release: ReleaseResponse = self
            .handle_response(response, &format!("tag '{}'", tag))
            .await?;

        Ok(ReleaseRecord {
            id: release.id,
            url: release.html_url,
            tag: release.tag_name,
        })
    }

    async fn close_milestone(&self, version: &str) -> Result<bool, ForgeError> {
        let url = self.repo_url("milestones");
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&[("state", "open")])
            .send()
            .await
            .map_err(Self::network_err)?;

        let milestones: Vec<MilestoneResponse> =
            self.handle_response(response, "open milestones").await?;

        let Some(milestone) = milestones.into_iter().find(|m| m.title == version) else {
            return Ok(false);
        };

        let url = self.repo_url(&format!("milestones/{}", milestone.number));
        let response = self
            .client
            .patch(&url)
            .headers(self.headers())
            .json(&CloseMilestoneBody { state: "closed" })
            .send()
            .await
            .map_err(Self::network_err)?;

        self.handle_empty_response(response, &format!("milestone '{}'", version))
            .await?;
        Ok(true)
    }

    async fn release_workflow_runs(&self, tag: &str) -> Result<Vec<WorkflowRun>, ForgeError> {
        let url = self.repo_url("actions/runs");
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&[("event", "release")])
            .send()
            .await
            .map_err(Self::network_err)?;

        let runs: WorkflowRunsResponse = self
            .handle_response(response, "release workflow runs")
            .await?;

        // Release-event runs report the tag as their head branch.
        Ok(runs
            .workflow_runs
            .into_iter()
            .filter(|r| r.head_branch.as_deref() == Some(tag))
            .map(|r| WorkflowRun {
                name: r.name,
                status: parse_check_status(&r.status),
                conclusion: r.conclusion.as_deref().map(parse_conclusion),
            })
            .collect())
    }
}

/// Parse a GitHub remote URL into (owner, repo).
///
/// Handles both HTTPS and SSH URLs:
/// - `https://github.com/owner/repo.git` -> `Some(("owner", "repo"))`
/// - `git@github.com:owner/repo.git` -> `Some(("owner", "repo"))`
///
/// Returns `None` for non-GitHub URLs.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"))?;

    let path = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}
