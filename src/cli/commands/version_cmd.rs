//! version command - print what the next publish would release

use anyhow::{bail, Result};

use crate::cli::Context;
use crate::core::config::Config;
use crate::git::Git;
use crate::manifest::Manifest;
use crate::release::{resolver, VersionSpec};

/// Resolve and print the next version without publishing. Read-only.
pub fn next_version(ctx: &Context, version: Option<&str>) -> Result<()> {
    let cwd = ctx.resolved_cwd()?;
    let git = Git::open(&cwd)?;
    let config = Config::load(Some(git.work_dir()))?;

    let Some(branch) = git.current_branch()? else {
        bail!("HEAD is detached; check out the working branch first");
    };

    let manifest = Manifest::load(&git.work_dir().join(config.manifest()))?;
    let current = manifest.version()?;

    let spec = version.map(str::parse::<VersionSpec>).transpose()?;
    let resolution = resolver::resolve(
        &current,
        &branch,
        &config.policy(),
        &config.default_target(),
        spec.as_ref(),
    )?;

    println!("{}", resolution.proposed);
    Ok(())
}
