//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--interactive` / `--no-interactive`: Control prompts
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Slipway - release publication from the command line
#[derive(Parser, Debug)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if slipway was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable interactive prompts
    #[arg(long = "interactive", global = true, conflicts_with = "no_interactive")]
    pub interactive_flag: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// Returns true if:
    /// - `--interactive` was explicitly set, OR
    /// - Neither `--no-interactive` nor `--quiet` was set AND stdin is a TTY
    pub fn interactive(&self) -> bool {
        if self.interactive_flag {
            true
        } else if self.no_interactive || self.quiet {
            false
        } else {
            std::io::stdin().is_terminal()
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish a release from the current branch
    #[command(
        long_about = "Publish a release from the current branch.\n\n\
            Synchronizes the working branch with its remote, decides whether a \
            release is warranted, opens (or resumes) the promotion pull request, \
            waits for checks, merges, tags the target branch, creates the release \
            record, and resets the working branch to the next development version.\n\n\
            Safe to re-run after any failure: the pipeline re-derives its position \
            from the repository, the open PR, and the registry.",
        after_help = "\
EXAMPLES:
    # Release with the configured (or patch) increment
    slipway publish

    # Release a minor version
    slipway publish minor

    # Release an exact version
    slipway publish 2.1.0

    # See what would happen without touching anything
    slipway publish --dry-run

    # In batch tooling, treat an already-published version as success
    slipway publish --skip-if-published"
    )]
    Publish {
        /// Version to release: patch, minor, major, or an exact version
        #[arg(value_name = "VERSION")]
        version: Option<String>,

        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,

        /// Exit successfully if the version is already published
        #[arg(long)]
        skip_if_published: bool,

        /// Delete an orphaned tag left by an interrupted run and re-tag
        #[arg(long)]
        force_republish: bool,
    },

    /// Print the version the next publish would release
    #[command(name = "version")]
    NextVersion {
        /// Version spec to resolve instead of the configured increment
        #[arg(value_name = "VERSION")]
        version: Option<String>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
