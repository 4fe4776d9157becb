//! Shared test fixtures: real git repositories with a bare origin.

// Each integration test binary uses a different subset of the fixture.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use slipway::git::Git;

/// A working clone wired to a bare origin, both temporary.
pub struct RemoteRepo {
    origin: TempDir,
    work: TempDir,
}

impl RemoteRepo {
    /// Create an origin and a clone of it, with `package.json` at
    /// `version` committed on `branch` and pushed.
    pub fn new(branch: &str, package: &str, version: &str) -> Self {
        let origin = TempDir::new().expect("failed to create origin dir");
        let work = TempDir::new().expect("failed to create work dir");

        run_git(origin.path(), &["init", "--bare"]);
        // Point the origin's HEAD at the fixture branch so fresh clones
        // start on it instead of git's default branch.
        let head_ref = format!("refs/heads/{}", branch);
        run_git(origin.path(), &["symbolic-ref", "HEAD", &head_ref]);

        let origin_url = origin.path().to_string_lossy().to_string();
        run_git(work.path(), &["init", "-b", branch]);
        run_git(work.path(), &["config", "user.email", "test@example.com"]);
        run_git(work.path(), &["config", "user.name", "Test User"]);
        run_git(work.path(), &["remote", "add", "origin", &origin_url]);

        let repo = Self { origin, work };
        repo.write_manifest(package, version, &[]);
        repo.commit_all("initial commit");
        repo.push(branch);
        repo
    }

    pub fn work_path(&self) -> &Path {
        self.work.path()
    }

    pub fn origin_path(&self) -> &Path {
        self.origin.path()
    }

    pub fn git(&self) -> Git {
        Git::open(self.work_path()).expect("failed to open work repo")
    }

    /// Write package.json with the given extra top-level string fields.
    pub fn write_manifest(&self, package: &str, version: &str, extra: &[(&str, &str)]) {
        let mut body = format!("{{\n  \"name\": \"{}\",\n  \"version\": \"{}\"", package, version);
        for (key, value) in extra {
            body.push_str(&format!(",\n  \"{}\": \"{}\"", key, value));
        }
        body.push_str("\n}\n");
        std::fs::write(self.work_path().join("package.json"), body).unwrap();
    }

    pub fn write_file(&self, path: &str, content: &str) {
        std::fs::write(self.work_path().join(path), content).unwrap();
    }

    pub fn commit_all(&self, message: &str) {
        run_git(self.work_path(), &["add", "-A"]);
        run_git(self.work_path(), &["commit", "-m", message]);
    }

    pub fn push(&self, branch: &str) {
        run_git(self.work_path(), &["push", "-u", "origin", branch]);
    }

    pub fn checkout(&self, branch: &str) {
        run_git(self.work_path(), &["checkout", branch]);
    }

    pub fn create_branch(&self, branch: &str) {
        run_git(self.work_path(), &["branch", branch]);
    }

    pub fn head_sha(&self) -> String {
        git_stdout(self.work_path(), &["rev-parse", "HEAD"])
    }

    /// The manifest version currently on the given branch, read from git.
    pub fn manifest_version_on(&self, branch: &str) -> String {
        let content = git_stdout(self.work_path(), &["show", &format!("{}:package.json", branch)]);
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        value["version"].as_str().unwrap().to_string()
    }

    /// Whether the origin has the given tag.
    pub fn origin_has_tag(&self, tag: &str) -> bool {
        let output = git_stdout(
            self.origin_path(),
            &["tag", "--list", tag],
        );
        !output.is_empty()
    }

    /// Whether the origin has the given branch.
    pub fn origin_has_branch(&self, branch: &str) -> bool {
        let output = git_stdout(
            self.origin_path(),
            &["branch", "--list", branch],
        );
        !output.is_empty()
    }

    /// Tip of a branch on the origin.
    pub fn origin_sha(&self, branch: &str) -> String {
        git_stdout(self.origin_path(), &["rev-parse", branch])
    }

    /// A second clone of the same origin, for simulating other actors.
    pub fn second_clone(&self) -> SecondClone {
        let dir = TempDir::new().expect("failed to create clone dir");
        let origin_url = self.origin_path().to_string_lossy().to_string();
        run_git(dir.path(), &["clone", &origin_url, "clone"]);
        let path = dir.path().join("clone");
        run_git(&path, &["config", "user.email", "other@example.com"]);
        run_git(&path, &["config", "user.name", "Other User"]);
        SecondClone { _dir: dir, path }
    }
}

/// A clone that simulates a different actor pushing to the same origin.
pub struct SecondClone {
    _dir: TempDir,
    path: PathBuf,
}

impl SecondClone {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run(&self, args: &[&str]) {
        run_git(&self.path, args);
    }

    pub fn write_file(&self, file: &str, content: &str) {
        std::fs::write(self.path.join(file), content).unwrap();
    }

    pub fn commit_all(&self, message: &str) {
        run_git(&self.path, &["add", "-A"]);
        run_git(&self.path, &["commit", "-m", message]);
    }
}

/// Run a git command, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to spawn");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and return trimmed stdout.
pub fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to spawn");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}
