//! release::sync
//!
//! Branch synchronization with the remote, with a narrow conflict
//! auto-resolution policy.
//!
//! # Design
//!
//! `sync` fetches the remote counterpart of a branch and merges it into
//! the local branch (which must be checked out). Conflicts are only ever
//! auto-resolved when every conflicting file is the version-bookkeeping
//! manifest: the manifest's version field is *expected* to differ across
//! branches, so keeping the local side is safe. Any other conflicting
//! file aborts the merge and escalates with the file list; the tool never
//! guesses intent on real content.
//!
//! Conflict detection is structural (merge exit status plus the index's
//! conflict entries), never substring matching on git's output.
//!
//! Fetch failures are reported as a distinct variant so the caller can
//! treat them as transient (warn and continue) rather than fatal.

use thiserror::Error;

use crate::core::types::BranchName;
use crate::git::{Git, GitError};

/// Errors from branch synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching from the remote failed. Transient: the caller decides
    /// whether to continue on possibly-stale state.
    #[error("fetch from '{remote}' failed: {source}")]
    Fetch {
        remote: String,
        #[source]
        source: GitError,
    },

    /// The merge conflicted outside the manifest allow-list. The merge
    /// has been aborted; the working tree is back to its pre-merge state.
    #[error("merge of '{branch}' conflicts in: {}", .files.join(", "))]
    Conflict { branch: String, files: Vec<String> },

    /// Any other git failure.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Outcome of one synchronization attempt. Transient: consumed by the
/// caller, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Whether local and remote now agree.
    pub in_sync: bool,
    /// Local branch tip after the sync.
    pub local_sha: String,
    /// Remote branch tip, when a remote counterpart exists.
    pub remote_sha: Option<String>,
    /// Files that were auto-resolved by keeping the local side.
    pub resolved_files: Vec<String>,
    /// Whether a merge commit was created.
    pub merged: bool,
}

/// Bring `branch` into agreement with `remote/branch`.
///
/// The branch must be checked out. When no remote counterpart exists the
/// result is trivially in sync; the first push will create it.
///
/// `manifest_file` is the one file conflicts may be auto-resolved in.
/// When `install_command` is set and the merge touched the manifest, it
/// runs afterwards and any resulting changes are committed separately
/// from the merge commit.
pub fn sync(
    git: &Git,
    branch: &BranchName,
    remote: &str,
    manifest_file: &str,
    install_command: Option<&str>,
) -> Result<SyncResult, SyncError> {
    git.run(&["fetch", remote, branch.as_str()])
        .map_err(|source| SyncError::Fetch {
            remote: remote.to_string(),
            source,
        })?;

    let local_sha = git.resolve_ref(&format!("refs/heads/{}", branch))?;

    if !git.remote_branch_exists(remote, branch) {
        return Ok(SyncResult {
            in_sync: true,
            local_sha,
            remote_sha: None,
            resolved_files: Vec::new(),
            merged: false,
        });
    }

    let remote_ref = format!("refs/remotes/{}/{}", remote, branch);
    let remote_sha = git.resolve_ref(&remote_ref)?;

    // Local already contains the remote tip (equal or ahead).
    if git.is_ancestor(&remote_sha, &local_sha)? {
        return Ok(SyncResult {
            in_sync: true,
            local_sha,
            remote_sha: Some(remote_sha),
            resolved_files: Vec::new(),
            merged: false,
        });
    }

    let merge_spec = format!("{}/{}", remote, branch);
    let (merged_clean, _output) = git.run_unchecked(&["merge", "--no-edit", &merge_spec])?;

    let resolved_files = if merged_clean {
        Vec::new()
    } else {
        resolve_or_abort(git, branch, manifest_file)?
    };

    // A merge that touched the manifest may have invalidated installed
    // dependencies; refresh them and commit the result on its own. This
    // covers clean merges too: a remote dependency change merges without
    // conflict but still leaves the lockfile stale.
    if let Some(command) = install_command {
        if !resolved_files.is_empty() || manifest_changed(git, &local_sha, manifest_file)? {
            run_install_step(git, command)?;
        }
    }

    let local_sha = git.resolve_ref(&format!("refs/heads/{}", branch))?;
    Ok(SyncResult {
        in_sync: true,
        local_sha,
        remote_sha: Some(remote_sha),
        resolved_files,
        merged: true,
    })
}

/// Handle a failed merge: auto-resolve when conflicts are confined to the
/// manifest, abort and escalate otherwise.
fn resolve_or_abort(
    git: &Git,
    branch: &BranchName,
    manifest_file: &str,
) -> Result<Vec<String>, SyncError> {
    let conflicts = git.conflicted_files()?;

    // Merge failed without index conflicts: not a conflict at all
    // (e.g. local changes would be overwritten). Surface as-is.
    if conflicts.is_empty() {
        git.run_unchecked(&["merge", "--abort"])?;
        return Err(SyncError::Git(GitError::Internal {
            message: format!("merge of '{}' failed without index conflicts", branch),
        }));
    }

    let outside_allow_list: Vec<String> = conflicts
        .iter()
        .filter(|file| file.as_str() != manifest_file)
        .cloned()
        .collect();

    if !outside_allow_list.is_empty() {
        git.run(&["merge", "--abort"])?;
        return Err(SyncError::Conflict {
            branch: branch.to_string(),
            files: conflicts,
        });
    }

    // Keep our side of the manifest and complete the merge.
    for file in &conflicts {
        git.run(&["checkout", "--ours", file])?;
        git.run(&["add", file])?;
    }
    git.run(&["commit", "--no-edit"])?;
    Ok(conflicts)
}

/// Whether `manifest_file` differs between `since` and the current HEAD.
fn manifest_changed(git: &Git, since: &str, manifest_file: &str) -> Result<bool, SyncError> {
    let output = git.run(&["diff", "--name-only", since, "HEAD"])?;
    Ok(output.lines().iter().any(|file| file.as_str() == manifest_file))
}

/// Run the dependency-installation command and commit any resulting
/// changes separately from the merge commit.
fn run_install_step(git: &Git, command: &str) -> Result<(), SyncError> {
    git.run_tool(command)?;
    let status = git.worktree_status(true)?;
    if !status.is_clean() || status.untracked > 0 {
        git.run(&["add", "-A"])?;
        git.run(&["commit", "-m", "chore: refresh dependencies after sync"])?;
    }
    Ok(())
}
