//! Property-based tests for version resolution.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;
use semver::Version;

use slipway::core::config::Increment;
use slipway::release::resolver::{bump, next_development};

/// Strategy for stable versions (no prerelease).
fn stable_version() -> impl Strategy<Value = Version> {
    (0u64..1000, 0u64..1000, 0u64..1000).prop_map(|(major, minor, patch)| {
        Version::new(major, minor, patch)
    })
}

/// Strategy for versions that may carry a dev prerelease.
fn any_version() -> impl Strategy<Value = Version> {
    (stable_version(), prop::option::of(0u64..50)).prop_map(|(mut version, pre)| {
        if let Some(n) = pre {
            version.pre = semver::Prerelease::new(&format!("dev.{}", n)).unwrap();
        }
        version
    })
}

fn increment() -> impl Strategy<Value = Increment> {
    prop_oneof![
        Just(Increment::Patch),
        Just(Increment::Minor),
        Just(Increment::Major),
    ]
}

proptest! {
    /// A bump strictly exceeds the input under semver ordering.
    #[test]
    fn bump_strictly_increases(version in any_version(), level in increment()) {
        let bumped = bump(&version, level, None);
        prop_assert!(bumped > version, "{} -> {} is not an increase", version, bumped);
    }

    /// Bumping changes exactly the expected component and zeroes the
    /// lower ones.
    #[test]
    fn bump_zeroes_lower_components(version in stable_version(), level in increment()) {
        let bumped = bump(&version, level, None);
        match level {
            Increment::Patch => {
                prop_assert_eq!(bumped.major, version.major);
                prop_assert_eq!(bumped.minor, version.minor);
                prop_assert_eq!(bumped.patch, version.patch + 1);
            }
            Increment::Minor => {
                prop_assert_eq!(bumped.major, version.major);
                prop_assert_eq!(bumped.minor, version.minor + 1);
                prop_assert_eq!(bumped.patch, 0);
            }
            Increment::Major => {
                prop_assert_eq!(bumped.major, version.major + 1);
                prop_assert_eq!(bumped.minor, 0);
                prop_assert_eq!(bumped.patch, 0);
            }
        }
    }

    /// Bumping never produces a prerelease unless a tag is supplied.
    #[test]
    fn untagged_bump_is_stable(version in any_version(), level in increment()) {
        let bumped = bump(&version, level, None);
        prop_assert!(bumped.pre.is_empty());
        prop_assert!(bumped.build.is_empty());
    }

    /// A patch bump of a prerelease graduates it: same numbers, no suffix.
    #[test]
    fn patch_graduates_prerelease(version in stable_version(), n in 0u64..50) {
        let mut pre = version.clone();
        pre.pre = semver::Prerelease::new(&format!("dev.{}", n)).unwrap();
        let bumped = bump(&pre, Increment::Patch, None);
        prop_assert_eq!(bumped, version);
    }

    /// The development version always sorts between the released version
    /// and the next stable patch.
    #[test]
    fn development_sorts_between_releases(version in stable_version()) {
        let dev = next_development(&version);
        let next_patch = Version::new(version.major, version.minor, version.patch + 1);
        prop_assert!(dev > version);
        prop_assert!(dev < next_patch);
        prop_assert!(!dev.pre.is_empty());
    }

    /// Tagged bumps stay on the same core as the equivalent untagged bump.
    #[test]
    fn tagged_bump_matches_untagged_core(version in stable_version(), level in increment()) {
        let tagged = bump(&version, level, Some("beta"));
        let untagged = bump(&version, level, None);
        prop_assert_eq!(
            (tagged.major, tagged.minor, tagged.patch),
            (untagged.major, untagged.minor, untagged.patch)
        );
        prop_assert!(!tagged.pre.is_empty());
    }
}
