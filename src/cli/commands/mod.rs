//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Wires the pipeline's collaborators (git, forge, registry, config)
//! 3. Runs the pipeline and formats output
//!
//! The publish command is async because it involves network I/O; dispatch
//! bridges into tokio with a per-command runtime.

mod completion;
mod publish;
mod version_cmd;

pub use publish::{publish, PublishOptions};

use anyhow::Result;

use super::args::Command;
use super::Context;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Publish {
            version,
            dry_run,
            skip_if_published,
            force_republish,
        } => publish::publish(
            ctx,
            PublishOptions {
                version,
                dry_run,
                skip_if_published,
                force_republish,
            },
        ),
        Command::NextVersion { version } => version_cmd::next_version(ctx, version.as_deref()),
        Command::Completion { shell } => completion::completion(shell),
    }
}
