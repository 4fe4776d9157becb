//! git::interface
//!
//! Git interface implementation.
//!
//! This module is the **single doorway** to all git operations in slipway.
//! No other module imports `git2` or spawns `git` directly. The split of
//! responsibilities:
//!
//! - **Reads** (current branch, ancestry, worktree status, ref existence)
//!   go through `git2` and return structured values.
//! - **Mutations and network operations** (fetch, merge, push, tag) go
//!   through [`Git::run`], an argument-array subprocess execution with no
//!   shell in between, so untrusted text such as branch names can never be
//!   interpreted as shell syntax.
//!
//! # Error Handling
//!
//! Failures are categorized into typed variants. Subprocess failures carry
//! the exit status and raw stderr; callers classify outcomes from the
//! status and from structured follow-up queries (e.g. the conflict set in
//! the index), never from substring-matching stderr.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::types::{BranchName, TypeError};

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// A git subprocess exited with a non-zero status.
    #[error("git {command} failed{}: {stderr}", exit_suffix(.status))]
    CommandFailed {
        /// The argv that was executed, joined for display
        command: String,
        /// Exit status code, if the process exited normally
        status: Option<i32>,
        /// Raw stderr from the subprocess
        stderr: String,
    },

    /// A subprocess could not be spawned at all.
    #[error("failed to run {command}: {source}")]
    SpawnFailed {
        /// The program and arguments
        command: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Invalid object id format.
    #[error("invalid object id: {sha}")]
    InvalidSha {
        /// The invalid SHA string
        sha: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

fn exit_suffix(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" (exit {})", code),
        None => " (killed by signal)".to_string(),
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::Internal {
            message: err.to_string(),
        }
    }
}

/// Captured output of a git subprocess.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// Standard output, UTF-8 lossy
    pub stdout: String,
    /// Standard error, UTF-8 lossy
    pub stderr: String,
}

impl CmdOutput {
    /// Stdout with trailing whitespace trimmed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim_end()
    }

    /// Non-empty trimmed lines of stdout.
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree is clean (untracked files do not count).
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }
}

/// The git interface.
///
/// All repository reads and writes flow through this type.
///
/// # Example
///
/// ```ignore
/// use slipway::git::Git;
/// use std::path::Path;
///
/// let git = Git::open(Path::new("."))?;
/// if let Some(branch) = git.current_branch()? {
///     println!("on {}", branch);
/// }
/// git.run(&["fetch", "origin", "main"])?;
/// ```
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Working directory (repo root)
    work_dir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Opening and paths
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(Self { repo, work_dir })
    }

    /// Working directory (repository root).
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Git common directory, shared across worktrees. Lock files live here.
    pub fn common_dir(&self) -> &Path {
        self.repo.commondir()
    }

    // =========================================================================
    // Branch and ref queries
    // =========================================================================

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None) // Detached HEAD
    }

    /// Get the HEAD commit SHA.
    pub fn head_sha(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Resolve a ref to its commit SHA, or `None` if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let commit = reference.peel_to_commit()?;
                Ok(Some(commit.id().to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a ref to its commit SHA.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<String, GitError> {
        self.try_resolve_ref(refname)?
            .ok_or_else(|| GitError::RefNotFound {
                refname: refname.to_string(),
            })
    }

    /// Check whether a local branch exists.
    pub fn local_branch_exists(&self, branch: &BranchName) -> bool {
        self.repo
            .find_reference(&format!("refs/heads/{}", branch))
            .is_ok()
    }

    /// Check whether a remote-tracking branch exists (after a fetch).
    pub fn remote_branch_exists(&self, remote: &str, branch: &BranchName) -> bool {
        self.repo
            .find_reference(&format!("refs/remotes/{}/{}", remote, branch))
            .is_ok()
    }

    /// Check whether a tag exists locally.
    pub fn tag_exists(&self, name: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/tags/{}", name))
            .is_ok()
    }

    /// Check whether a tag exists on the remote.
    ///
    /// This queries the remote directly (`ls-remote`), so it sees tags that
    /// have never been fetched.
    pub fn remote_tag_exists(&self, remote: &str, name: &str) -> Result<bool, GitError> {
        let refname = format!("refs/tags/{}", name);
        let output = self.run(&["ls-remote", "--tags", remote, &refname])?;
        Ok(!output.trimmed().is_empty())
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// Returns true when the SHAs are equal (a commit is its own ancestor).
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = git2::Oid::from_str(ancestor).map_err(|_| GitError::InvalidSha {
            sha: ancestor.to_string(),
        })?;
        let descendant_oid = git2::Oid::from_str(descendant).map_err(|_| GitError::InvalidSha {
            sha: descendant.to_string(),
        })?;

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    // =========================================================================
    // Working tree status
    // =========================================================================

    /// Get working tree status summary.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    /// Check if working tree is clean (no staged or unstaged changes).
    pub fn is_worktree_clean(&self) -> Result<bool, GitError> {
        Ok(self.worktree_status(false)?.is_clean())
    }

    /// Check if there are unresolved conflicts in the index.
    pub fn has_conflicts(&self) -> Result<bool, GitError> {
        let index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;
        Ok(index.has_conflicts())
    }

    /// Paths of all conflicted entries in the index.
    ///
    /// This is the structured conflict signal used by the synchronizer;
    /// it replaces grepping merge output for "CONFLICT".
    pub fn conflicted_files(&self) -> Result<Vec<String>, GitError> {
        let index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let mut files = Vec::new();
        let conflicts = index.conflicts().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;
        for conflict in conflicts {
            let conflict = conflict.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
            // Prefer "our" side; deleted-on-ours falls back to theirs
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                if let Ok(path) = String::from_utf8(entry.path.clone()) {
                    if !files.contains(&path) {
                        files.push(path);
                    }
                }
            }
        }

        Ok(files)
    }

    /// Read a file's content from a branch tip without checking it out.
    ///
    /// Equivalent to `git show <branch>:<path>`.
    pub fn file_at_branch(&self, branch: &str, path: &str) -> Result<String, GitError> {
        let spec = format!("{}:{}", branch, path);
        let object = self.repo.revparse_single(&spec)?;
        let blob = object.peel_to_blob()?;
        String::from_utf8(blob.content().to_vec()).map_err(|_| GitError::Internal {
            message: format!("{} is not valid UTF-8", spec),
        })
    }

    // =========================================================================
    // Subprocess execution
    // =========================================================================

    /// Execute a git command with an argument array, in the repo root.
    ///
    /// There is no shell involved; each element of `args` is passed as a
    /// single argv entry.
    ///
    /// # Errors
    ///
    /// [`GitError::CommandFailed`] with the exit status and raw stderr on
    /// a non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<CmdOutput, GitError> {
        let (status, output) = run_in(&self.work_dir, "git", args)?;
        if status.success() {
            Ok(output)
        } else {
            Err(GitError::CommandFailed {
                command: args.join(" "),
                status: status.code(),
                stderr: output.stderr.trim_end().to_string(),
            })
        }
    }

    /// Execute a git command, reporting success separately from output.
    ///
    /// For operations where a non-zero exit is an expected outcome rather
    /// than a failure (e.g. a merge that stops on conflicts), so the caller
    /// can inspect structured state instead of treating the status as fatal.
    pub fn run_unchecked(&self, args: &[&str]) -> Result<(bool, CmdOutput), GitError> {
        let (status, output) = run_in(&self.work_dir, "git", args)?;
        Ok((status.success(), output))
    }

    /// Execute an arbitrary whitespace-separated command line in the repo
    /// root, without a shell.
    ///
    /// Used for configured hooks (verify command, install command). The
    /// command string is split on whitespace; there is no quoting or
    /// variable expansion.
    pub fn run_tool(&self, command_line: &str) -> Result<CmdOutput, GitError> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| GitError::Internal {
            message: "empty command line".to_string(),
        })?;
        let args: Vec<&str> = parts.collect();

        let (status, output) = run_in(&self.work_dir, program, &args)?;
        if status.success() {
            Ok(output)
        } else {
            Err(GitError::CommandFailed {
                command: command_line.to_string(),
                status: status.code(),
                stderr: output.stderr.trim_end().to_string(),
            })
        }
    }
}

/// Spawn `program args...` in `dir`, capturing output.
fn run_in(
    dir: &Path,
    program: &str,
    args: &[&str],
) -> Result<(std::process::ExitStatus, CmdOutput), GitError> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| GitError::SpawnFailed {
            command: format!("{} {}", program, args.join(" ")),
            source: e,
        })?;

    Ok((
        output.status,
        CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cmd_output {
        use super::*;

        #[test]
        fn trimmed_strips_trailing_newline() {
            let out = CmdOutput {
                stdout: "abc123\n".into(),
                stderr: String::new(),
            };
            assert_eq!(out.trimmed(), "abc123");
        }

        #[test]
        fn lines_filters_blanks() {
            let out = CmdOutput {
                stdout: "a\n\n  b  \n".into(),
                stderr: String::new(),
            };
            assert_eq!(out.lines(), vec!["a".to_string(), "b".to_string()]);
        }
    }

    mod worktree_status {
        use super::*;

        #[test]
        fn default_is_clean() {
            assert!(WorktreeStatus::default().is_clean());
        }

        #[test]
        fn staged_or_unstaged_changes_make_dirty() {
            let status = WorktreeStatus {
                staged: 1,
                ..Default::default()
            };
            assert!(!status.is_clean());

            let status = WorktreeStatus {
                unstaged: 2,
                ..Default::default()
            };
            assert!(!status.is_clean());
        }

        #[test]
        fn conflicts_make_dirty() {
            let status = WorktreeStatus {
                has_conflicts: true,
                ..Default::default()
            };
            assert!(!status.is_clean());
        }

        #[test]
        fn untracked_files_do_not_make_dirty() {
            let status = WorktreeStatus {
                untracked: 5,
                ..Default::default()
            };
            assert!(status.is_clean());
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn command_failed_display_names_command() {
            let err = GitError::CommandFailed {
                command: "push origin main".into(),
                status: Some(128),
                stderr: "remote rejected".into(),
            };
            let message = err.to_string();
            assert!(message.contains("push origin main"));
            assert!(message.contains("exit 128"));
            assert!(message.contains("remote rejected"));
        }
    }
}
