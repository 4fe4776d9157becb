//! release::resolver
//!
//! Pure computation of the next version.
//!
//! # Design
//!
//! Given the current manifest version, the current branch, the branch
//! policy, and an optional operator-supplied spec, produce the proposed
//! version and the resolved target branch. No clock, no randomness, no
//! I/O: identical inputs always yield identical output.
//!
//! Branch-dependent mode: when the current branch has a policy entry, the
//! version tag and increment level come from the *target* branch's policy
//! entry, not the source's. That way multiple source branches converging
//! onto one target all produce releases tagged by the target's rules.
//!
//! Bump semantics follow npm: bumping a prerelease at the patch level
//! releases it (`2.0.0-dev.0` patch-bumps to `2.0.0`, not `2.0.1`), and
//! higher-level bumps zero the lower components (`1.2.3` minor-bumps to
//! `1.3.0`).

use semver::{BuildMetadata, Prerelease, Version};
use std::str::FromStr;

use crate::core::config::{BranchPolicy, Increment};
use crate::core::types::BranchName;

use super::PublishError;

/// Identifier used for development prerelease versions (`1.0.2-dev.0`).
const DEV_PRERELEASE_ID: &str = "dev";

/// Operator-supplied version request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Bump the given component.
    Increment(Increment),
    /// Use this exact version.
    Exact(Version),
}

impl FromStr for VersionSpec {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(Self::Increment(Increment::Patch)),
            "minor" => Ok(Self::Increment(Increment::Minor)),
            "major" => Ok(Self::Increment(Increment::Major)),
            other => Version::parse(other)
                .map(Self::Exact)
                .map_err(|_| PublishError::InvalidVersionSpec(other.to_string())),
        }
    }
}

/// Outcome of version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The version currently in the manifest.
    pub current: Version,
    /// The version this run proposes to publish.
    pub proposed: Version,
    /// The branch the release is promoted onto.
    pub target_branch: BranchName,
    /// Version tag for the proposed version, from policy (usually empty
    /// for stable releases, or e.g. "beta" for prerelease trains).
    pub version_tag: Option<String>,
    /// Whether the proposed version carries a prerelease component.
    pub is_prerelease: bool,
}

impl Resolution {
    /// Tag name for the proposed version (`v` + version).
    pub fn tag_name(&self) -> String {
        format!("v{}", self.proposed)
    }
}

/// Resolve the proposed version and target branch.
///
/// `default_target` is used when the current branch has no policy entry.
/// An explicit `spec` always wins over policy increments.
pub fn resolve(
    current: &Version,
    current_branch: &BranchName,
    policy: &BranchPolicy,
    default_target: &BranchName,
    spec: Option<&VersionSpec>,
) -> Result<Resolution, PublishError> {
    // Target branch: policy entry for the current branch, else the default.
    let target_branch = policy
        .entry(current_branch)
        .and_then(|entry| entry.target.clone())
        .unwrap_or_else(|| default_target.clone());

    // Tag string and increment come from the target's policy entry.
    let target_entry = policy.entry(&target_branch);
    let version_tag = target_entry.and_then(|entry| entry.tag.clone()).filter(|t| !t.is_empty());
    let policy_increment = target_entry.and_then(|entry| entry.increment);

    let proposed = match spec {
        Some(VersionSpec::Exact(version)) => version.clone(),
        Some(VersionSpec::Increment(level)) => bump(current, *level, version_tag.as_deref()),
        None => bump(
            current,
            policy_increment.unwrap_or(Increment::Patch),
            version_tag.as_deref(),
        ),
    };

    let is_prerelease = !proposed.pre.is_empty();
    Ok(Resolution {
        current: current.clone(),
        proposed,
        target_branch,
        version_tag,
        is_prerelease,
    })
}

/// Bump a version by one level, npm-style.
///
/// A version with a prerelease component patch-bumps by dropping the
/// prerelease (the version "graduates"). When `tag` is set, the bumped
/// version gets a `-{tag}.N` prerelease suffix, continuing the counter if
/// the current version already carries the same tag.
pub fn bump(current: &Version, level: Increment, tag: Option<&str>) -> Version {
    let mut next = match level {
        Increment::Patch => {
            if current.pre.is_empty() {
                Version::new(current.major, current.minor, current.patch + 1)
            } else {
                // Graduating a prerelease: strip the suffix, keep the numbers.
                Version::new(current.major, current.minor, current.patch)
            }
        }
        Increment::Minor => Version::new(current.major, current.minor + 1, 0),
        Increment::Major => Version::new(current.major + 1, 0, 0),
    };

    if let Some(tag) = tag {
        let counter = continuation_counter(current, &next, level, tag);
        // Tag identifiers are config-controlled; an invalid one falls back
        // to a bare version rather than failing resolution.
        if let Ok(pre) = Prerelease::new(&format!("{}.{}", tag, counter)) {
            next.pre = pre;
        }
    }
    next.build = BuildMetadata::EMPTY;
    next
}

/// When re-bumping within the same prerelease train (`1.3.0-beta.2` ->
/// `1.3.0-beta.3`), continue the counter; otherwise start at 0.
fn continuation_counter(current: &Version, next: &Version, level: Increment, tag: &str) -> u64 {
    let same_core = match level {
        Increment::Patch => true,
        Increment::Minor | Increment::Major => {
            current.major == next.major && current.minor == next.minor
        }
    };
    if !same_core {
        return 0;
    }
    let mut parts = current.pre.as_str().splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(current_tag), Some(counter)) if current_tag == tag => {
            counter.parse::<u64>().map(|n| n + 1).unwrap_or(0)
        }
        _ => 0,
    }
}

/// The next development version after releasing `released`: patch + 1 with
/// a `-dev.0` suffix (`1.0.1` released -> `1.0.2-dev.0` on the working
/// branch).
pub fn next_development(released: &Version) -> Version {
    let mut next = Version::new(released.major, released.minor, released.patch + 1);
    if let Ok(pre) = Prerelease::new(&format!("{}.0", DEV_PRERELEASE_ID)) {
        next.pre = pre;
    }
    next
}
