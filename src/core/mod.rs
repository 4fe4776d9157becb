//! core
//!
//! Shared domain types, configuration, and the working-copy lock.
//!
//! # Modules
//!
//! - [`types`]: Validated primitives ([`types::BranchName`])
//! - [`config`]: Configuration schema and loading, including the branch policy
//! - [`lock`]: Exclusive advisory lock over working-copy mutation

pub mod config;
pub mod lock;
pub mod types;
