//! release::orchestrator
//!
//! The end-to-end publication sequence.
//!
//! # Design
//!
//! One linear pipeline of fallible steps; each step's success is the next
//! step's precondition. The orchestrator holds no state between
//! invocations: resumability comes from re-deriving position from
//! authoritative sources at each step: the current branch, existing tags,
//! the open PR (looked up by head branch, never created blindly), and the
//! registry's view of the package.
//!
//! The advisory repository lock is held per mutating phase and released
//! between them, so a long checks wait never blocks other publishers
//! working in the same clone, and a crash inside any phase still releases
//! the lock on unwind.
//!
//! Dry-run short-circuits every mutation and every network call with a
//! synthesized success and touches no external system.

use semver::Version;
use std::path::PathBuf;

use crate::core::config::Config;
use crate::core::lock::RepoLock;
use crate::core::types::BranchName;
use crate::forge::{Forge, MergeMethod};
use crate::git::Git;
use crate::manifest::Manifest;
use crate::registry::Registry;
use crate::ui::output::Output;
use crate::ui::prompts::{self, PromptError};

use super::necessity;
use super::pr::{self, WaitPolicy};
use super::resolver::{self, Resolution, VersionSpec};
use super::sync::{self, SyncError};
use super::tag::{self, TagFlags, TagState};
use super::PublishError;

/// Operator-controlled knobs for one publish run.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Version override: bump level or exact version.
    pub version_spec: Option<VersionSpec>,
    /// Simulate: no mutation, no network, synthesized successes.
    pub dry_run: bool,
    /// Treat an already-published version as success.
    pub skip_if_published: bool,
    /// Delete an orphaned tag and re-create it.
    pub force_republish: bool,
}

/// How a publish run ended. All three are exit-0 outcomes; the marker on
/// stdout tells batch tooling which one happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A release was created.
    Released { version: Version, tag: String },
    /// Nothing to publish; no mutation performed.
    Skipped { reason: String },
    /// The version was already fully published and the run asked for
    /// that to count as success.
    AlreadyPublished { version: Version },
}

/// The publication pipeline, wired to its collaborators.
pub struct Publisher<'a> {
    git: &'a Git,
    forge: &'a dyn Forge,
    registry: &'a dyn Registry,
    config: &'a Config,
    out: Output,
    /// Resolved by the caller from flags, config, and terminal state.
    interactive: bool,
}

impl<'a> Publisher<'a> {
    pub fn new(
        git: &'a Git,
        forge: &'a dyn Forge,
        registry: &'a dyn Registry,
        config: &'a Config,
        out: Output,
        interactive: bool,
    ) -> Self {
        Self {
            git,
            forge,
            registry,
            config,
            out,
            interactive,
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.git.work_dir().join(self.config.manifest())
    }

    fn wait_policy(&self) -> WaitPolicy {
        let checks = self.config.checks();
        WaitPolicy {
            timeout: std::time::Duration::from_secs(checks.timeout_secs),
            poll_interval: std::time::Duration::from_secs(checks.poll_interval_secs),
            interactive: self.interactive,
        }
    }

    /// Run the full pipeline.
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError> {
        // Step 1: where are we, and where does this branch release to?
        let source = self.git.current_branch()?.ok_or(PublishError::Precondition {
            step: "resolve-branches",
            message: "HEAD is detached; check out the working branch first".to_string(),
        })?;

        let manifest = Manifest::load(&self.manifest_path())?;
        let current_version = manifest.version()?;
        let package = manifest.name()?.to_string();

        let resolution = resolver::resolve(
            &current_version,
            &source,
            &self.config.policy(),
            &self.config.default_target(),
            request.version_spec.as_ref(),
        )?;
        let target = resolution.target_branch.clone();
        self.out.debug(&format!(
            "publishing '{}' {} -> {} onto '{}'",
            package, resolution.current, resolution.proposed, target
        ));

        // Step 2: bring the working branch up to date with its remote.
        self.sync_source(&source, request)?;

        // Step 3: the target branch must exist locally before we can
        // diff against it or check it out later.
        self.ensure_target_branch(&target, request)?;

        // Step 4: structural prechecks.
        self.prechecks(&source, &target, request)?;

        // Step 5: is there anything to publish?
        let verdict = necessity::evaluate(
            self.git,
            &source,
            &target,
            self.config.remote(),
            self.config.manifest(),
        );
        if !verdict.necessary {
            self.out.info(&format!("skipping: {}", verdict.reason));
            return Ok(PublishOutcome::Skipped {
                reason: verdict.reason,
            });
        }
        self.out.debug(&format!("release warranted: {}", verdict.reason));

        // Steps 6-7: get a merged promotion PR for the proposed version.
        let (version, release_tag) = match self
            .promote(&source, &target, &package, resolution, request)
            .await?
        {
            Promotion::Merged { version, tag } => (version, tag),
            Promotion::AlreadyPublished { version } => {
                return Ok(PublishOutcome::AlreadyPublished { version });
            }
        };

        // Step 8: tag the target and create the release record.
        self.tag_and_release(&target, &version, &release_tag, request)
            .await?;

        // Step 9: put the working branch back into a releasable state.
        // The publish is complete; nothing here may undo it.
        if let Err(e) = self.reconcile(&source, &target, &version, request).await {
            self.out.warn(&format!(
                "post-publish reconciliation failed: {}\n\
                 The release is complete; bring '{}' back in line with '{}' manually.",
                e, source, target
            ));
        }

        Ok(PublishOutcome::Released {
            version,
            tag: release_tag,
        })
    }

    /// Step 2. Fetch failures are transient warnings; real conflicts are
    /// fatal with the file list.
    fn sync_source(&self, source: &BranchName, request: &PublishRequest) -> Result<(), PublishError> {
        if request.dry_run {
            self.out.info(&format!("[dry-run] would sync '{}' with remote", source));
            return Ok(());
        }
        let _lock = RepoLock::acquire(self.git.common_dir())?;
        match sync::sync(
            self.git,
            source,
            self.config.remote(),
            self.config.manifest(),
            self.config.install_command(),
        ) {
            Ok(result) => {
                if !result.resolved_files.is_empty() {
                    self.out.info(&format!(
                        "auto-resolved merge conflict in {}",
                        result.resolved_files.join(", ")
                    ));
                }
                Ok(())
            }
            Err(SyncError::Fetch { remote, source: e }) => {
                self.out
                    .warn(&format!("fetch from '{}' failed ({}); continuing on local state", remote, e));
                Ok(())
            }
            Err(SyncError::Conflict { branch, files }) => {
                Err(PublishError::SyncConflict { branch, files })
            }
            Err(SyncError::Git(e)) => Err(e.into()),
        }
    }

    /// Step 3. Track the remote target if it exists, otherwise create it
    /// from HEAD (first release).
    fn ensure_target_branch(
        &self,
        target: &BranchName,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        if self.git.local_branch_exists(target) {
            return Ok(());
        }
        if request.dry_run {
            self.out.info(&format!("[dry-run] would create branch '{}'", target));
            return Ok(());
        }

        let _lock = RepoLock::acquire(self.git.common_dir())?;
        let remote = self.config.remote();
        if self.git.remote_branch_exists(remote, target) {
            let upstream = format!("{}/{}", remote, target);
            self.git
                .run(&["branch", "--track", target.as_str(), &upstream])?;
            self.out.debug(&format!("tracking '{}' from '{}'", target, upstream));
        } else {
            // First release: the branch must also exist on the remote
            // before a PR can target it.
            self.git.run(&["branch", target.as_str()])?;
            self.git.run(&["push", remote, target.as_str()])?;
            self.out.info(&format!("created '{}' from HEAD (first release)", target));
        }
        Ok(())
    }

    /// Step 4. Every failure is fatal, except under dry-run where it is
    /// reported and the simulation continues.
    fn prechecks(
        &self,
        source: &BranchName,
        target: &BranchName,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        let mut failures = Vec::new();

        match self.git.is_worktree_clean() {
            Ok(true) => {}
            Ok(false) => failures.push("working tree has uncommitted changes".to_string()),
            Err(e) => failures.push(format!("could not read working tree status: {}", e)),
        }

        if source == target {
            failures.push(format!(
                "currently on target branch '{}'; releases run from a working branch",
                target
            ));
        }

        for var in self.config.required_env() {
            if std::env::var_os(&var).is_none() {
                failures.push(format!("required environment variable {} is not set", var));
            }
        }

        if self.config.verify_command().is_none() {
            failures.push("no verify_command configured; declare the pre-flight check".to_string());
        }

        if failures.is_empty() {
            return Ok(());
        }
        if request.dry_run {
            for failure in &failures {
                self.out.warn(&format!("[dry-run] precheck would fail: {}", failure));
            }
            return Ok(());
        }
        Err(PublishError::Precondition {
            step: "prechecks",
            message: failures.join("; "),
        })
    }

    /// Steps 6-7: ensure a PR exists for the release, wait for checks,
    /// merge it. Returns the version that is now on the target branch.
    async fn promote(
        &self,
        source: &BranchName,
        target: &BranchName,
        package: &str,
        resolution: Resolution,
        request: &PublishRequest,
    ) -> Result<Promotion, PublishError> {
        if request.dry_run {
            self.out.info(&format!(
                "[dry-run] would open and merge a PR releasing {} onto '{}'",
                resolution.proposed, target
            ));
            return Ok(Promotion::Merged {
                tag: resolution.tag_name(),
                version: resolution.proposed,
            });
        }

        let existing = self.forge.find_pr_by_head(source.as_str()).await?;

        // Resuming an open PR: the version bump is already committed, so
        // the manifest version is the release version. Otherwise resolve
        // afresh: the sync may have pulled manifest changes.
        let (version, release_tag) = {
            let manifest = Manifest::load(&self.manifest_path())?;
            let current = manifest.version()?;
            if existing.is_some() {
                let tag = format!("v{}", current);
                (current, tag)
            } else {
                let resolution = resolver::resolve(
                    &current,
                    source,
                    &self.config.policy(),
                    &self.config.default_target(),
                    request.version_spec.as_ref(),
                )?;
                (resolution.proposed.clone(), resolution.tag_name())
            }
        };

        // Disambiguate crashed-run leftovers before committing anything.
        let flags = TagFlags {
            skip_if_published: request.skip_if_published,
            force_republish: request.force_republish,
        };
        let state = {
            let _lock = RepoLock::acquire(self.git.common_dir())?;
            tag::preflight(
                self.git,
                self.registry,
                package,
                &version.to_string(),
                &release_tag,
                self.config.remote(),
                flags,
                &self.out,
            )
            .await?
        };
        if state == TagState::Published {
            if flags.skip_if_published {
                self.out.info(&format!("{} is already published", version));
                return Ok(Promotion::AlreadyPublished { version });
            }
            return Err(PublishError::DuplicateVersion {
                version: version.to_string(),
                tag: release_tag,
            });
        }

        let pr = match existing {
            Some(pr) => pr,
            None => {
                self.confirm_release(&version, target)?;
                self.prepare_release_commit(source, target, &version)?;
                let title = format!("Release v{}", version);
                let body = self.release_body(source, target);
                let (pr, _created) = pr::ensure_pr(
                    self.forge,
                    source.as_str(),
                    target.as_str(),
                    &title,
                    body,
                    &self.out,
                )
                .await?;
                pr
            }
        };

        // Waits happen without the lock: they mutate nothing locally.
        pr::wait_for_checks(self.forge, &pr, self.wait_policy(), &self.out).await?;
        pr::merge(
            self.forge,
            &pr,
            self.config.merge_strategy().into(),
            false,
            &self.out,
        )
        .await?;

        Ok(Promotion::Merged {
            version,
            tag: release_tag,
        })
    }

    /// Last stop before mutating anything: in interactive mode the
    /// operator approves the resolved version.
    fn confirm_release(&self, version: &Version, target: &BranchName) -> Result<(), PublishError> {
        if !self.interactive {
            return Ok(());
        }
        let question = format!("Release v{} onto '{}'?", version, target);
        abort_unless(prompts::confirm(&question, true, true), "confirm-release")
    }

    /// Step 6 mutations: refresh dependencies, run the verification
    /// script, write and commit the version bump, push.
    fn prepare_release_commit(
        &self,
        source: &BranchName,
        target: &BranchName,
        version: &Version,
    ) -> Result<(), PublishError> {
        let _lock = RepoLock::acquire(self.git.common_dir())?;
        let remote = self.config.remote();

        if let Some(install) = self.config.install_command() {
            self.out.debug(&format!("refreshing dependencies: {}", install));
            self.git.run_tool(install)?;
        }

        if let Some(verify) = self.config.verify_command() {
            self.out.info(&format!("running verification: {}", verify));
            self.git.run_tool(verify)?;
        }

        // Dependency refresh may have changed lock state; keep that
        // separate from the version bump.
        let status = self.git.worktree_status(true)?;
        if !status.is_clean() || status.untracked > 0 {
            self.git.run(&["add", "-A"])?;
            self.git.run(&["commit", "-m", "chore: refresh dependencies"])?;
        }

        let mut manifest = Manifest::load(&self.manifest_path())?;
        manifest.set_version(version)?;
        manifest.write()?;
        self.git.run(&["add", self.config.manifest()])?;
        let message = format!("chore: release v{}", version);
        self.git.run(&["commit", "-m", &message])?;
        self.git.run(&["push", remote, source.as_str()])?;
        self.out.debug(&format!(
            "committed and pushed version bump to {} (targeting '{}')",
            version, target
        ));
        Ok(())
    }

    /// Release notes: the commits the target does not have yet.
    fn release_body(&self, source: &BranchName, target: &BranchName) -> Option<String> {
        let range = format!("{}..{}", target, source);
        let log = self
            .git
            .run(&["log", "--pretty=format:- %s", &range])
            .ok()?;
        let body = log.trimmed();
        if body.is_empty() {
            None
        } else {
            Some(format!("## Changes\n\n{}\n", body))
        }
    }

    /// Step 8: check out the target, sync it, tag, create the release.
    async fn tag_and_release(
        &self,
        target: &BranchName,
        version: &Version,
        release_tag: &str,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        if request.dry_run {
            self.out.info(&format!(
                "[dry-run] would tag '{}' as {} and create the release",
                target, release_tag
            ));
            return Ok(());
        }

        let remote = self.config.remote();
        {
            let _lock = RepoLock::acquire(self.git.common_dir())?;
            self.git.run(&["checkout", target.as_str()])?;
            match sync::sync(self.git, target, remote, self.config.manifest(), None) {
                Ok(_) => {}
                Err(SyncError::Fetch { remote, source: e }) => {
                    self.out.warn(&format!(
                        "fetch from '{}' failed ({}); tagging local state",
                        remote, e
                    ));
                }
                Err(SyncError::Conflict { branch, files }) => {
                    return Err(PublishError::SyncConflict { branch, files });
                }
                Err(SyncError::Git(e)) => return Err(e.into()),
            }

            let title = format!("v{}", version);
            let body = self
                .release_body_for_tag(release_tag)
                .unwrap_or_else(|| format!("Release v{}", version));
            tag::publish_tag_and_release(
                self.git,
                self.forge,
                release_tag,
                &title,
                &body,
                remote,
                &self.out,
            )
            .await?;
        }

        tag::close_milestone_best_effort(self.forge, &version.to_string(), &self.out).await;

        if self.config.checks().wait_for_release_workflows {
            pr::wait_for_release_workflows(self.forge, release_tag, self.wait_policy(), &self.out)
                .await;
        }
        Ok(())
    }

    /// Notes for the release record: commits since the previous tag.
    fn release_body_for_tag(&self, current_tag: &str) -> Option<String> {
        let previous = self
            .git
            .run(&["describe", "--tags", "--abbrev=0", &format!("{}^", current_tag)])
            .ok()?;
        let previous = previous.trimmed().to_string();
        let range = format!("{}..{}", previous, current_tag);
        let log = self.git.run(&["log", "--pretty=format:- %s", &range]).ok()?;
        let body = log.trimmed();
        if body.is_empty() {
            None
        } else {
            Some(format!("## Changes since {}\n\n{}\n", previous, body))
        }
    }

    /// Step 9: return to the working branch, realign it with the target,
    /// and start the next development version.
    async fn reconcile(
        &self,
        source: &BranchName,
        target: &BranchName,
        released: &Version,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        let next = resolver::next_development(released);
        if request.dry_run {
            self.out.info(&format!(
                "[dry-run] would reset '{}' onto '{}' and bump to {}",
                source, target, next
            ));
            return Ok(());
        }

        let _lock = RepoLock::acquire(self.git.common_dir())?;
        let remote = self.config.remote();
        self.git.run(&["checkout", source.as_str()])?;
        self.git.run(&["fetch", remote, source.as_str()])?;

        match self.config.merge_strategy() {
            crate::core::config::MergeStrategy::Squash => {
                // Histories diverged by construction; replace the source
                // branch with the target. Refuse if someone pushed to the
                // source since the merge: their commits are not on target
                // and a reset would drop them.
                let remote_ref = format!("refs/remotes/{}/{}", remote, source);
                if let Some(remote_tip) = self.git.try_resolve_ref(&remote_ref)? {
                    let local_tip = self.git.head_sha()?;
                    if remote_tip != local_tip {
                        return Err(PublishError::Precondition {
                            step: "reconcile",
                            message: format!(
                                "'{}' moved on the remote during the release; not force-pushing",
                                source
                            ),
                        });
                    }
                }
                self.git.run(&["reset", "--hard", target.as_str()])?;
                let lease = format!("--force-with-lease={}", source);
                self.git.run(&["push", &lease, remote, source.as_str()])?;
            }
            crate::core::config::MergeStrategy::Merge => {
                self.git
                    .run(&["merge", "--no-edit", target.as_str()])?;
            }
        }

        let mut manifest = Manifest::load(&self.manifest_path())?;
        manifest.set_version(&next)?;
        manifest.write()?;
        self.git.run(&["add", self.config.manifest()])?;
        let message = format!("chore: begin v{} development", next);
        self.git.run(&["commit", "-m", &message])?;
        self.git.run(&["push", remote, source.as_str()])?;
        self.out.info(&format!("'{}' is now at {}", source, next));
        Ok(())
    }
}

/// Anything but an explicit or defaulted yes aborts the step.
fn abort_unless(
    answer: Result<bool, PromptError>,
    step: &'static str,
) -> Result<(), PublishError> {
    match answer {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(PublishError::Aborted { step }),
    }
}

/// Internal outcome of the PR phase.
enum Promotion {
    Merged { version: Version, tag: String },
    AlreadyPublished { version: Version },
}

// Keep the config-level strategy and the forge-level method aligned.
impl From<crate::core::config::MergeStrategy> for MergeMethod {
    fn from(strategy: crate::core::config::MergeStrategy) -> Self {
        match strategy {
            crate::core::config::MergeStrategy::Squash => MergeMethod::Squash,
            crate::core::config::MergeStrategy::Merge => MergeMethod::Merge,
        }
    }
}
