//! release::necessity
//!
//! Decides whether there is anything worth publishing.
//!
//! # Design
//!
//! Compares the current branch against the target branch at file level.
//! The only case that skips a release is a diff confined to the manifest
//! where everything except the version field is structurally equal. Every
//! inconclusive signal (absent target, empty diff, malformed manifest,
//! command failure) resolves to "necessary": an unnecessary publish is
//! recoverable, a silently skipped one is not.

use crate::core::types::BranchName;
use crate::git::Git;
use crate::manifest;

/// Whether a release is warranted, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNecessity {
    pub necessary: bool,
    pub reason: String,
}

impl ReleaseNecessity {
    fn yes(reason: impl Into<String>) -> Self {
        Self {
            necessary: true,
            reason: reason.into(),
        }
    }

    fn no(reason: impl Into<String>) -> Self {
        Self {
            necessary: false,
            reason: reason.into(),
        }
    }
}

/// Evaluate whether publishing from `current_branch` onto `target` is
/// warranted.
///
/// Infallible by design: every error path degrades to `necessary=true`
/// with the cause in the reason string.
pub fn evaluate(
    git: &Git,
    current_branch: &BranchName,
    target: &BranchName,
    remote: &str,
    manifest_file: &str,
) -> ReleaseNecessity {
    // Prefer the remote view of the target; fall back to local.
    let target_ref = if git.remote_branch_exists(remote, target) {
        format!("{}/{}", remote, target)
    } else if git.local_branch_exists(target) {
        target.to_string()
    } else {
        return ReleaseNecessity::yes(format!("first release to '{}'", target));
    };

    let changed = match diff_files(git, current_branch.as_str(), &target_ref) {
        Ok(files) => files,
        Err(reason) => {
            return ReleaseNecessity::yes(format!("diff against '{}' failed: {}", target_ref, reason))
        }
    };

    if changed.is_empty() {
        // Inconclusive: branches may point at the same commit via an
        // unexpected path. Favor publishing over silently skipping.
        return ReleaseNecessity::yes("no detectable diff; proceeding conservatively");
    }

    if changed.len() == 1 && changed[0] == manifest_file {
        return manifest_only_verdict(git, current_branch, &target_ref, manifest_file);
    }

    ReleaseNecessity::yes(format!("{} file(s) changed", changed.len()))
}

/// The diff touches only the manifest: structurally compare both sides
/// with the version field masked out.
fn manifest_only_verdict(
    git: &Git,
    current_branch: &BranchName,
    target_ref: &str,
    manifest_file: &str,
) -> ReleaseNecessity {
    let ours = match git.file_at_branch(current_branch.as_str(), manifest_file) {
        Ok(content) => content,
        Err(e) => return ReleaseNecessity::yes(format!("could not read manifest: {}", e)),
    };
    let theirs = match git.file_at_branch(target_ref, manifest_file) {
        Ok(content) => content,
        Err(e) => return ReleaseNecessity::yes(format!("could not read target manifest: {}", e)),
    };

    match manifest::equal_ignoring_version(&ours, &theirs) {
        Ok(true) => ReleaseNecessity::no("only the manifest version differs; nothing to publish"),
        Ok(false) => ReleaseNecessity::yes("manifest changed beyond the version field"),
        Err(e) => ReleaseNecessity::yes(format!("manifest comparison failed: {}", e)),
    }
}

/// Names of files differing between two refs.
fn diff_files(git: &Git, ours: &str, theirs: &str) -> Result<Vec<String>, String> {
    let range = format!("{}..{}", theirs, ours);
    let output = git
        .run(&["diff", "--name-only", &range])
        .map_err(|e| e.to_string())?;
    Ok(output.lines())
}
