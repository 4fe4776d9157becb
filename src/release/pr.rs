//! release::pr
//!
//! Pull request lifecycle: find-or-create, wait for checks, merge.
//!
//! # Design
//!
//! Lookup is keyed by head branch and happens before any create call, so
//! re-invocation after a failure resumes on the existing PR instead of
//! opening a duplicate. The checks wait is skipped entirely when the
//! repository has no check automation (waiting would be unbounded and
//! meaningless). Merge failures are classified by HTTP status, not by
//! message text: 405 and 409 mean the PR is not mergeable and become
//! `PrConflict`, which the operator resolves on the forge and re-runs.

use std::time::{Duration, Instant};

use crate::forge::{
    summarize_checks, ChecksVerdict, CreatePrRequest, Forge, ForgeError, MergeMethod, PullRequest,
};
use crate::ui::output::Output;
use crate::ui::prompts;

use super::PublishError;

/// HTTP statuses the forge uses for a non-mergeable PR.
const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
const STATUS_CONFLICT: u16 = 409;

/// How long and how often to poll for checks.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Whether the operator can be asked to stop waiting and proceed.
    pub interactive: bool,
}

/// Find the open PR for `head`, or create one.
///
/// Returns the PR and whether it was newly created.
pub async fn ensure_pr(
    forge: &dyn Forge,
    head: &str,
    base: &str,
    title: &str,
    body: Option<String>,
    out: &Output,
) -> Result<(PullRequest, bool), PublishError> {
    if let Some(existing) = forge.find_pr_by_head(head).await? {
        out.info(&format!(
            "resuming open PR #{} ({})",
            existing.number, existing.url
        ));
        return Ok((existing, false));
    }

    let pr = forge
        .create_pr(CreatePrRequest {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body,
        })
        .await?;
    out.info(&format!("opened PR #{} ({})", pr.number, pr.url));
    Ok((pr, true))
}

/// Block until all checks on the PR head pass.
///
/// Skipped when the repository has no check automation. A failed check is
/// fatal immediately; hitting the timeout asks the operator (when
/// interactive) whether to proceed without further waiting.
pub async fn wait_for_checks(
    forge: &dyn Forge,
    pr: &PullRequest,
    policy: WaitPolicy,
    out: &Output,
) -> Result<(), PublishError> {
    match forge.has_check_automation().await {
        Ok(false) => {
            out.debug("no check automation configured; skipping checks wait");
            return Ok(());
        }
        Ok(true) => {}
        // Detection failure is transient: fall through and poll anyway.
        Err(e) => out.warn(&format!("could not detect check automation: {}", e)),
    }

    let started = Instant::now();
    loop {
        let checks = forge.list_checks(&pr.head_sha).await?;
        match summarize_checks(&checks) {
            ChecksVerdict::Passed => {
                out.info("all checks passed");
                return Ok(());
            }
            ChecksVerdict::Failed(names) => {
                return Err(PublishError::ChecksFailed { checks: names });
            }
            ChecksVerdict::None | ChecksVerdict::Pending => {}
        }

        if started.elapsed() >= policy.timeout {
            return on_timeout(policy, out);
        }
        out.debug(&format!(
            "checks pending on {} ({}s elapsed)",
            pr.head_sha,
            started.elapsed().as_secs()
        ));
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Timeout reached: offer the interactive escape hatch.
fn on_timeout(policy: WaitPolicy, out: &Output) -> Result<(), PublishError> {
    if policy.interactive {
        if let Ok(true) = prompts::confirm(
            "Checks are still pending. Proceed without waiting?",
            false,
            true,
        ) {
            out.warn("proceeding without completed checks");
            return Ok(());
        }
    }
    Err(PublishError::ChecksTimeout {
        seconds: policy.timeout.as_secs(),
    })
}

/// Merge the PR, classifying a non-mergeable response as `PrConflict`.
pub async fn merge(
    forge: &dyn Forge,
    pr: &PullRequest,
    method: MergeMethod,
    delete_branch: bool,
    out: &Output,
) -> Result<(), PublishError> {
    match forge.merge_pr(pr.number, method, delete_branch).await {
        Ok(()) => {
            out.info(&format!("merged PR #{}", pr.number));
            Ok(())
        }
        Err(ForgeError::ApiError { status, .. })
            if status == STATUS_METHOD_NOT_ALLOWED || status == STATUS_CONFLICT =>
        {
            Err(PublishError::PrConflict { number: pr.number })
        }
        Err(e) => Err(e.into()),
    }
}

/// Wait for release-triggered workflow runs to finish.
///
/// Best-effort throughout: detection failures, run failures, and timeouts
/// are warnings. The publish is already complete by the time this runs.
pub async fn wait_for_release_workflows(
    forge: &dyn Forge,
    tag: &str,
    policy: WaitPolicy,
    out: &Output,
) {
    let started = Instant::now();
    loop {
        let runs = match forge.release_workflow_runs(tag).await {
            Ok(runs) => runs,
            Err(e) => {
                out.warn(&format!("could not query release workflows: {}", e));
                return;
            }
        };

        let checks: Vec<_> = runs
            .iter()
            .map(|run| crate::forge::CheckRun {
                name: run.name.clone(),
                status: run.status,
                conclusion: run.conclusion,
            })
            .collect();

        match summarize_checks(&checks) {
            ChecksVerdict::Passed => {
                out.info("release workflows finished");
                return;
            }
            ChecksVerdict::None if started.elapsed() > policy.poll_interval => {
                // No run ever appeared; nothing is listening to releases.
                out.debug(&format!("no workflow runs for {}", tag));
                return;
            }
            ChecksVerdict::Failed(names) => {
                out.warn(&format!(
                    "release workflows failed: {} (publish already complete)",
                    names.join(", ")
                ));
                return;
            }
            _ => {}
        }

        if started.elapsed() >= policy.timeout {
            out.warn(&format!(
                "gave up waiting for release workflows after {}s",
                policy.timeout.as_secs()
            ));
            return;
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockForge;
    use crate::ui::Verbosity;

    fn out() -> Output {
        Output::new(Verbosity::Quiet)
    }

    fn policy() -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            interactive: false,
        }
    }

    #[tokio::test]
    async fn ensure_pr_reuses_existing() {
        let forge = MockForge::new();
        let (first, created) = ensure_pr(&forge, "develop", "main", "Release", None, &out())
            .await
            .unwrap();
        assert!(created);

        let (second, created) = ensure_pr(&forge, "develop", "main", "Release", None, &out())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.number, second.number);
    }

    #[tokio::test]
    async fn checks_skipped_without_automation() {
        let forge = MockForge::new();
        forge.set_check_automation(false);
        // No scripted polls: would hang if the wait were not skipped.
        let pr = forge
            .create_pr(CreatePrRequest {
                head: "develop".into(),
                base: "main".into(),
                title: "Release".into(),
                body: None,
            })
            .await
            .unwrap();
        wait_for_checks(&forge, &pr, policy(), &out()).await.unwrap();
    }

    #[tokio::test]
    async fn checks_pass_after_pending() {
        let forge = MockForge::new();
        forge.script_check_polls(vec![
            vec![MockForge::pending_check("ci")],
            vec![MockForge::passing_check("ci")],
        ]);
        let pr = forge
            .create_pr(CreatePrRequest {
                head: "develop".into(),
                base: "main".into(),
                title: "Release".into(),
                body: None,
            })
            .await
            .unwrap();
        wait_for_checks(&forge, &pr, policy(), &out()).await.unwrap();
    }

    #[tokio::test]
    async fn failed_check_is_fatal() {
        let forge = MockForge::new();
        forge.script_check_polls(vec![vec![
            MockForge::passing_check("build"),
            MockForge::failing_check("test"),
        ]]);
        let pr = forge
            .create_pr(CreatePrRequest {
                head: "develop".into(),
                base: "main".into(),
                title: "Release".into(),
                body: None,
            })
            .await
            .unwrap();
        let result = wait_for_checks(&forge, &pr, policy(), &out()).await;
        match result {
            Err(PublishError::ChecksFailed { checks }) => {
                assert_eq!(checks, vec!["test".to_string()]);
            }
            other => panic!("expected ChecksFailed, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn pending_forever_times_out() {
        let forge = MockForge::new();
        forge.script_check_polls(vec![vec![MockForge::pending_check("ci")]]);
        let pr = forge
            .create_pr(CreatePrRequest {
                head: "develop".into(),
                base: "main".into(),
                title: "Release".into(),
                body: None,
            })
            .await
            .unwrap();
        let result = wait_for_checks(&forge, &pr, policy(), &out()).await;
        assert!(matches!(result, Err(PublishError::ChecksTimeout { .. })));
    }

    #[tokio::test]
    async fn non_mergeable_is_pr_conflict() {
        let forge = MockForge::new();
        let pr = forge
            .create_pr(CreatePrRequest {
                head: "develop".into(),
                base: "main".into(),
                title: "Release".into(),
                body: None,
            })
            .await
            .unwrap();
        forge.clear_fail_on();
        let forge = forge.fail_on(crate::forge::mock::FailOn::MergePr(ForgeError::ApiError {
            status: 405,
            message: "Pull Request is not mergeable".into(),
        }));
        let result = merge(&forge, &pr, MergeMethod::Squash, true, &out()).await;
        assert!(matches!(
            result,
            Err(PublishError::PrConflict { number }) if number == pr.number
        ));
    }
}
