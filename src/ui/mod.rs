//! ui
//!
//! Terminal output and interactive prompts.

pub mod output;
pub mod prompts;

pub use output::{Output, Verbosity};
