//! Slipway - release publication from the command line
//!
//! Slipway promotes a versioned package from its working branch to a
//! published release: it synchronizes branches, computes the next version,
//! opens and merges the promotion pull request, creates the tag and
//! release record, and resets the working branch to the next development
//! version.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the pipeline)
//! - [`release`] - The publication pipeline and its stages
//! - [`core`] - Configuration, domain types, and the repository lock
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - Abstraction for remote forges (GitHub v1)
//! - [`registry`] - Package registry queries
//! - [`manifest`] - Package manifest read/write
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! Slipway maintains the following invariants:
//!
//! 1. Re-invocation after any failure is safe: state is re-derived from
//!    the repository, the forge, and the registry, never from a saved
//!    progress marker
//! 2. All working-copy mutations happen under the advisory repository lock
//! 3. Merge conflicts are auto-resolved only in the manifest file
//! 4. A completed publish is never rolled back by a later failure

pub mod cli;
pub mod core;
pub mod forge;
pub mod git;
pub mod manifest;
pub mod registry;
pub mod release;
pub mod ui;
