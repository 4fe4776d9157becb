//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge provides a deterministic implementation of the `Forge` trait
//! for use in tests. It stores PRs in memory and allows configuring failure
//! scenarios: scripted check poll results, a countdown of release-creation
//! failures (to exercise propagation-lag retries), and a merge hook so pipeline
//! tests can perform a real git merge when the mock "merges" a PR.
//!
//! # Example
//!
//! ```
//! use slipway::forge::mock::MockForge;
//! use slipway::forge::{Forge, CreatePrRequest, PrState};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//!
//! let pr = forge.create_pr(CreatePrRequest {
//!     head: "develop".to_string(),
//!     base: "main".to_string(),
//!     title: "Release v1.2.0".to_string(),
//!     body: None,
//! }).await.unwrap();
//!
//! assert_eq!(pr.number, 1);
//! assert_eq!(pr.state, PrState::Open);
//!
//! let found = forge.find_pr_by_head("develop").await.unwrap();
//! assert_eq!(found.unwrap().number, 1);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::traits::{
    CheckConclusion, CheckRun, CheckStatus, CreatePrRequest, Forge, ForgeError, MergeMethod,
    PrState, PullRequest, ReleaseRecord, WorkflowRun,
};

/// Hook invoked when the mock merges a PR, so tests can mirror the merge
/// into a real repository.
pub type MergeHook = Arc<dyn Fn(&PullRequest, MergeMethod) + Send + Sync>;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Clone)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
struct MockForgeInner {
    /// Stored PRs by number.
    prs: HashMap<u64, PullRequest>,
    /// Next PR number to assign.
    next_pr_number: u64,
    /// Whether the repository has check automation configured.
    has_check_automation: bool,
    /// Scripted check poll results, consumed front to back. When exhausted,
    /// the last scripted result repeats.
    check_polls: VecDeque<Vec<CheckRun>>,
    /// Remaining create_release calls that fail with NotFound.
    release_failures_remaining: u32,
    /// Releases created, by tag.
    releases: HashMap<String, ReleaseRecord>,
    /// Next release id to assign.
    next_release_id: u64,
    /// Open milestone titles.
    open_milestones: Vec<String>,
    /// Workflow runs reported for release events, by tag.
    workflow_runs: HashMap<String, Vec<WorkflowRun>>,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Hook invoked on merge_pr.
    merge_hook: Option<MergeHook>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail create_pr with the given error.
    CreatePr(ForgeError),
    /// Fail get_pr with the given error.
    GetPr(ForgeError),
    /// Fail find_pr_by_head with the given error.
    FindPrByHead(ForgeError),
    /// Fail merge_pr with the given error.
    MergePr(ForgeError),
    /// Fail create_release with the given error.
    CreateRelease(ForgeError),
}

/// Recorded operation, for asserting on call order and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    FindPrByHead { head: String },
    GetPr { number: u64 },
    CreatePr { head: String, base: String },
    MergePr { number: u64, method: MergeMethod },
    ListChecks { sha: String },
    CreateRelease { tag: String },
    CloseMilestone { version: String },
}

impl std::fmt::Debug for MockForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockForge")
            .field("prs", &inner.prs.len())
            .field("releases", &inner.releases.len())
            .finish()
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockForge {
    /// Create an empty mock forge with check automation enabled.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                prs: HashMap::new(),
                next_pr_number: 1,
                has_check_automation: true,
                check_polls: VecDeque::new(),
                release_failures_remaining: 0,
                releases: HashMap::new(),
                next_release_id: 1,
                open_milestones: Vec::new(),
                workflow_runs: HashMap::new(),
                fail_on: None,
                merge_hook: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Configure which operation should fail.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on = Some(fail_on);
        self
    }

    /// Clear any configured failure.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Configure whether the repo appears to have check automation.
    pub fn set_check_automation(&self, enabled: bool) {
        self.inner.lock().unwrap().has_check_automation = enabled;
    }

    /// Script the sequence of check poll results. Each call to `list_checks`
    /// consumes one entry; the last entry repeats once the script runs out.
    pub fn script_check_polls(&self, polls: Vec<Vec<CheckRun>>) {
        self.inner.lock().unwrap().check_polls = polls.into();
    }

    /// Make the next `n` calls to `create_release` fail with `NotFound`,
    /// simulating tag propagation lag.
    pub fn fail_release_times(&self, n: u32) {
        self.inner.lock().unwrap().release_failures_remaining = n;
    }

    /// Install a hook that runs when a PR is merged.
    pub fn set_merge_hook<F>(&self, hook: F)
    where
        F: Fn(&PullRequest, MergeMethod) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().merge_hook = Some(Arc::new(hook));
    }

    /// Add an open milestone.
    pub fn add_milestone(&self, title: impl Into<String>) {
        self.inner.lock().unwrap().open_milestones.push(title.into());
    }

    /// Set the workflow runs reported for a release tag.
    pub fn set_workflow_runs(&self, tag: impl Into<String>, runs: Vec<WorkflowRun>) {
        self.inner.lock().unwrap().workflow_runs.insert(tag.into(), runs);
    }

    /// Seed an existing PR.
    pub fn add_pr(&self, pr: PullRequest) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_pr_number = inner.next_pr_number.max(pr.number + 1);
        inner.prs.insert(pr.number, pr);
    }

    /// Get the recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Get a PR without going through the async trait.
    pub fn get_pr_sync(&self, number: u64) -> Option<PullRequest> {
        self.inner.lock().unwrap().prs.get(&number).cloned()
    }

    /// All releases created so far, by tag.
    pub fn releases(&self) -> Vec<ReleaseRecord> {
        let mut releases: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .releases
            .values()
            .cloned()
            .collect();
        releases.sort_by_key(|r| r.id);
        releases
    }

    /// Whether a release exists for the given tag.
    pub fn has_release(&self, tag: &str) -> bool {
        self.inner.lock().unwrap().releases.contains_key(tag)
    }

    /// A passing check run, for scripting polls.
    pub fn passing_check(name: &str) -> CheckRun {
        CheckRun {
            name: name.to_string(),
            status: CheckStatus::Completed,
            conclusion: Some(CheckConclusion::Success),
        }
    }

    /// A failing check run, for scripting polls.
    pub fn failing_check(name: &str) -> CheckRun {
        CheckRun {
            name: name.to_string(),
            status: CheckStatus::Completed,
            conclusion: Some(CheckConclusion::Failure),
        }
    }

    /// An in-progress check run, for scripting polls.
    pub fn pending_check(name: &str) -> CheckRun {
        CheckRun {
            name: name.to_string(),
            status: CheckStatus::InProgress,
            conclusion: None,
        }
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::FindPrByHead {
            head: head.to_string(),
        });
        if let Some(FailOn::FindPrByHead(e)) = &inner.fail_on {
            return Err(e.clone());
        }
        Ok(inner
            .prs
            .values()
            .find(|pr| pr.head == head && pr.state == PrState::Open)
            .cloned())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::GetPr { number });
        if let Some(FailOn::GetPr(e)) = &inner.fail_on {
            return Err(e.clone());
        }
        inner
            .prs
            .get(&number)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", number)))
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreatePr {
            head: request.head.clone(),
            base: request.base.clone(),
        });
        if let Some(FailOn::CreatePr(e)) = &inner.fail_on {
            return Err(e.clone());
        }
        let number = inner.next_pr_number;
        inner.next_pr_number += 1;
        let pr = PullRequest {
            number,
            url: format!("https://mock.forge/pr/{}", number),
            state: PrState::Open,
            head: request.head,
            head_sha: format!("mock-sha-{}", number),
            base: request.base,
            title: request.title,
        };
        inner.prs.insert(number, pr.clone());
        Ok(pr)
    }

    async fn merge_pr(
        &self,
        number: u64,
        method: MergeMethod,
        _delete_branch: bool,
    ) -> Result<(), ForgeError> {
        let (pr, hook) = {
            let mut inner = self.inner.lock().unwrap();
            inner.operations.push(MockOperation::MergePr { number, method });
            if let Some(FailOn::MergePr(e)) = &inner.fail_on {
                return Err(e.clone());
            }
            let pr = inner
                .prs
                .get_mut(&number)
                .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", number)))?;
            pr.state = PrState::Merged;
            (pr.clone(), inner.merge_hook.clone())
        };
        // Hook runs outside the lock: it may call back into the mock.
        if let Some(hook) = hook {
            hook(&pr, method);
        }
        Ok(())
    }

    async fn list_checks(&self, sha: &str) -> Result<Vec<CheckRun>, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::ListChecks {
            sha: sha.to_string(),
        });
        if inner.check_polls.len() > 1 {
            Ok(inner.check_polls.pop_front().unwrap_or_default())
        } else {
            Ok(inner.check_polls.front().cloned().unwrap_or_default())
        }
    }

    async fn has_check_automation(&self) -> Result<bool, ForgeError> {
        Ok(self.inner.lock().unwrap().has_check_automation)
    }

    async fn create_release(
        &self,
        tag: &str,
        title: &str,
        _body: &str,
    ) -> Result<ReleaseRecord, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreateRelease {
            tag: tag.to_string(),
        });
        if let Some(FailOn::CreateRelease(e)) = &inner.fail_on {
            return Err(e.clone());
        }
        if inner.release_failures_remaining > 0 {
            inner.release_failures_remaining -= 1;
            return Err(ForgeError::NotFound(format!("tag '{}'", tag)));
        }
        let id = inner.next_release_id;
        inner.next_release_id += 1;
        let record = ReleaseRecord {
            id,
            url: format!("https://mock.forge/releases/{}", title),
            tag: tag.to_string(),
        };
        inner.releases.insert(tag.to_string(), record.clone());
        Ok(record)
    }

    async fn close_milestone(&self, version: &str) -> Result<bool, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CloseMilestone {
            version: version.to_string(),
        });
        let before = inner.open_milestones.len();
        inner.open_milestones.retain(|title| title != version);
        Ok(inner.open_milestones.len() < before)
    }

    async fn release_workflow_runs(&self, tag: &str) -> Result<Vec<WorkflowRun>, ForgeError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .workflow_runs
            .get(tag)
            .cloned()
            .unwrap_or_default())
    }
}
