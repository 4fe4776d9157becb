//! git
//!
//! Single interface for all git operations.
//!
//! All git interactions flow through [`Git`]: structured reads via git2,
//! mutations and network operations via argument-array subprocess
//! execution. No other module imports `git2` or spawns `git` directly.

mod interface;

pub use interface::{CmdOutput, Git, GitError, WorktreeStatus};
