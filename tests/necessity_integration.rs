//! Integration tests for the release necessity evaluator.

mod common;

use common::RemoteRepo;
use slipway::core::types::BranchName;
use slipway::release::necessity::evaluate;

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

#[test]
fn absent_target_means_first_release() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    let git = repo.git();

    let verdict = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert!(verdict.necessary);
    assert!(verdict.reason.contains("first release"));
}

#[test]
fn no_diff_is_conservatively_necessary() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    repo.create_branch("main");
    let git = repo.git();

    let verdict = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert!(verdict.necessary);
    assert!(verdict.reason.contains("conservatively"));
}

#[test]
fn version_only_change_is_not_necessary() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    repo.create_branch("main");
    repo.write_manifest("pkg", "1.0.1", &[]);
    repo.commit_all("version bump only");
    let git = repo.git();

    let verdict = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert!(!verdict.necessary);
    assert!(verdict.reason.contains("version"));
}

#[test]
fn manifest_field_change_is_necessary() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    repo.create_branch("main");
    repo.write_manifest("pkg", "1.0.1", &[("description", "now with more")]);
    repo.commit_all("bump and describe");
    let git = repo.git();

    let verdict = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert!(verdict.necessary);
}

#[test]
fn code_change_is_necessary() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    repo.create_branch("main");
    repo.write_file("index.js", "module.exports = 42;\n");
    repo.commit_all("add code");
    let git = repo.git();

    let verdict = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert!(verdict.necessary);
    assert!(verdict.reason.contains("1 file(s) changed"));
}

#[test]
fn prefers_remote_view_of_target() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    // Push the target so a remote counterpart exists...
    repo.create_branch("main");
    repo.push("main");
    repo.checkout("develop");
    repo.write_manifest("pkg", "1.0.1", &[]);
    repo.commit_all("version bump");
    let git = repo.git();

    // ...and the verdict still sees a version-only change via origin/main.
    let verdict = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert!(!verdict.necessary);
}

#[test]
fn idempotent_without_repository_change() {
    let repo = RemoteRepo::new("develop", "pkg", "1.0.0");
    repo.create_branch("main");
    repo.write_file("index.js", "code\n");
    repo.commit_all("add code");
    let git = repo.git();

    let first = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    let second = evaluate(&git, &branch("develop"), &branch("main"), "origin", "package.json");
    assert_eq!(first, second);
}
