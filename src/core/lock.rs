//! core::lock
//!
//! Exclusive working-copy lock for publish operations.
//!
//! # Architecture
//!
//! A publish run mutates shared state that git cannot protect at any
//! granularity finer than the whole working copy: the checked-out branch,
//! the index, and the manifest file. When a batch runner publishes several
//! packages out of the same clone, those runs must serialize. The lock is
//! an OS-level advisory lock at `<git common dir>/slipway/lock`, shared
//! across all worktrees of the repository.
//!
//! Read-only queries (status, diffs, ref lookups) do not take the lock.
//!
//! # Invariants
//!
//! - The lock is held for the duration of each mutating phase
//! - The lock is released on every exit path, including panics (RAII)
//! - Acquisition is non-blocking; a held lock fails fast

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("working copy is locked by another slipway process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An exclusive lock on the working copy.
///
/// The lock is released when this guard is dropped, so a crashed run can
/// never leave the working copy permanently locked.
///
/// # Example
///
/// ```ignore
/// use slipway::core::lock::RepoLock;
///
/// let lock = RepoLock::acquire(git.common_dir())?;
/// // ... mutate branches, tags, manifest ...
/// drop(lock); // released here (or on any early return)
/// ```
#[derive(Debug)]
pub struct RepoLock {
    /// Path to the lock file.
    path: PathBuf,
    /// Open file handle holding the lock. `Some` means we hold it.
    file: Option<File>,
}

impl RepoLock {
    /// Attempt to acquire the working-copy lock.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    /// Non-blocking: if another process holds the lock this returns
    /// [`LockError::AlreadyLocked`] immediately.
    ///
    /// `common_dir` is the git common directory, shared across worktrees,
    /// so every worktree of a repository contends on the same lock file.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(common_dir: &Path) -> Result<Self, LockError> {
        let slipway_dir = common_dir.join("slipway");
        fs::create_dir_all(&slipway_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", slipway_dir.display(), e))
        })?;

        let path = slipway_dir.join("lock");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning `None` if already held.
    pub fn try_acquire(common_dir: &Path) -> Result<Option<Self>, LockError> {
        match Self::acquire(common_dir) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if the lock is currently held by this guard.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// Called automatically on drop; use this when the lock must be
    /// released before the guard leaves scope (e.g. before a blocking wait
    /// on CI checks).
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
