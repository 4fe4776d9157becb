//! release::tag
//!
//! Idempotent tag and release-record creation.
//!
//! # Design
//!
//! Tag existence, registry state, and release-record existence are three
//! independent facts: a crashed prior run can leave any subset true. The
//! preflight check disambiguates them *before* any mutation:
//!
//! - tag exists and the registry reports the same version: the version is
//!   fully published (`DuplicateVersion`, or clean skip when requested)
//! - tag exists but the registry disagrees: orphan tag from an
//!   interrupted run (`TagConflict`, or delete-and-retag when forced)
//!
//! After pushing a tag the forge may not see it immediately. A short
//! settle delay absorbs most of the propagation lag; release creation
//! then retries a bounded number of times, but only on "reference not
//! found"; any other failure is fatal on the first occurrence.

use std::time::Duration;

use crate::forge::Forge;
use crate::git::Git;
use crate::registry::Registry;
use crate::ui::output::Output;

use super::PublishError;

/// Release creation attempts before giving up on tag propagation.
const RELEASE_CREATE_ATTEMPTS: u32 = 3;

/// Backoff between release creation attempts.
const RELEASE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Wait after pushing the tag before the first release attempt.
const TAG_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// What the preflight check found for a proposed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagState {
    /// No tag anywhere; proceed to tag and publish.
    Absent,
    /// Tag exists and the registry confirms the version is published.
    Published,
    /// Tag exists but the registry does not report this version.
    Orphaned,
}

/// Flags controlling how existing tags are handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagFlags {
    /// Treat an already-published version as success instead of an error.
    pub skip_if_published: bool,
    /// Delete an orphaned tag (local and remote) and re-create it.
    pub force_republish: bool,
}

/// Check what already exists for `version` before any mutation.
///
/// `Published` is returned to the caller to turn into either a clean skip
/// or `DuplicateVersion` depending on flags. `Orphaned` without
/// `force_republish` is an error here; with it, the local and remote tags
/// are deleted and the state degrades to `Absent`.
pub async fn preflight(
    git: &Git,
    registry: &dyn Registry,
    package: &str,
    version: &str,
    tag: &str,
    remote: &str,
    flags: TagFlags,
    out: &Output,
) -> Result<TagState, PublishError> {
    let local = git.tag_exists(tag);
    let remote_exists = git.remote_tag_exists(remote, tag)?;

    if !local && !remote_exists {
        return Ok(TagState::Absent);
    }

    let published = registry.published_version(package).await?;
    if published.as_deref() == Some(version) {
        return Ok(TagState::Published);
    }

    if !flags.force_republish {
        return Err(PublishError::TagConflict {
            version: version.to_string(),
            tag: tag.to_string(),
        });
    }

    out.warn(&format!(
        "tag {} exists but {} is not published; deleting and re-tagging",
        tag, version
    ));
    if local {
        git.run(&["tag", "-d", tag])?;
    }
    if remote_exists {
        let refspec = format!(":refs/tags/{}", tag);
        git.run(&["push", remote, &refspec])?;
    }
    Ok(TagState::Absent)
}

/// Create and push the tag, then create the release record.
///
/// The tag is created at the current HEAD of the checked-out branch.
/// Release creation retries only on propagation lag; exhausting the
/// retries leaves the tag in place and reports how many attempts were
/// made, so a re-run can pick up at release creation.
pub async fn publish_tag_and_release(
    git: &Git,
    forge: &dyn Forge,
    tag: &str,
    title: &str,
    body: &str,
    remote: &str,
    out: &Output,
) -> Result<(), PublishError> {
    if !git.tag_exists(tag) {
        git.run(&["tag", tag])?;
    }
    git.run(&["push", remote, &format!("refs/tags/{}", tag)])?;
    out.debug(&format!("pushed tag {}, settling", tag));
    tokio::time::sleep(TAG_SETTLE_DELAY).await;

    for attempt in 1..=RELEASE_CREATE_ATTEMPTS {
        match forge.create_release(tag, title, body).await {
            Ok(record) => {
                out.info(&format!("created release {} ({})", record.tag, record.url));
                return Ok(());
            }
            Err(e) if e.is_propagation_lag() => {
                out.debug(&format!(
                    "forge does not see {} yet (attempt {}/{})",
                    tag, attempt, RELEASE_CREATE_ATTEMPTS
                ));
                if attempt < RELEASE_CREATE_ATTEMPTS {
                    tokio::time::sleep(RELEASE_RETRY_DELAY).await;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(PublishError::TagPropagationTimeout {
        tag: tag.to_string(),
        attempts: RELEASE_CREATE_ATTEMPTS,
    })
}

/// Close the milestone named after the bare version. Failures are logged,
/// never fatal: a missing milestone does not compromise the publish.
pub async fn close_milestone_best_effort(forge: &dyn Forge, version: &str, out: &Output) {
    match forge.close_milestone(version).await {
        Ok(true) => out.debug(&format!("closed milestone {}", version)),
        Ok(false) => out.debug(&format!("no open milestone named {}", version)),
        Err(e) => out.warn(&format!("could not close milestone {}: {}", version, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_default_to_safe() {
        let flags = TagFlags::default();
        assert!(!flags.skip_if_published);
        assert!(!flags.force_republish);
    }
}
