//! publish command - run the release pipeline

use anyhow::Result;

use crate::cli::Context;
use crate::core::config::Config;
use crate::forge::{create_forge, mock::MockForge, token_from_env, Forge};
use crate::git::Git;
use crate::registry::{MockRegistry, NpmRegistry, Registry};
use crate::release::{PublishOutcome, PublishRequest, Publisher, VersionSpec};
use crate::ui::{Output, Verbosity};

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub version: Option<String>,
    pub dry_run: bool,
    pub skip_if_published: bool,
    pub force_republish: bool,
}

/// Publish a release from the current branch.
pub fn publish(ctx: &Context, opts: PublishOptions) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(publish_async(ctx, opts))
}

async fn publish_async(ctx: &Context, opts: PublishOptions) -> Result<()> {
    let cwd = ctx.resolved_cwd()?;
    let git = Git::open(&cwd)?;
    let config = Config::load(Some(git.work_dir()))?;
    let out = Output::new(Verbosity::from_flags(ctx.quiet, ctx.debug));

    let version_spec = opts
        .version
        .as_deref()
        .map(str::parse::<VersionSpec>)
        .transpose()?;

    let request = PublishRequest {
        version_spec,
        dry_run: opts.dry_run,
        skip_if_published: opts.skip_if_published,
        force_republish: opts.force_republish,
    };

    // Dry-run never contacts any external system; hand the pipeline inert
    // collaborators instead of live clients.
    let (forge, registry): (Box<dyn Forge>, Box<dyn Registry>) = if opts.dry_run {
        (Box::new(MockForge::new()), Box::new(MockRegistry::new()))
    } else {
        let remote_url = git
            .run(&["remote", "get-url", config.remote()])?
            .trimmed()
            .to_string();
        let token = token_from_env()?;
        (
            create_forge(&remote_url, token)?,
            Box::new(NpmRegistry::new()),
        )
    };

    let publisher = Publisher::new(
        &git,
        forge.as_ref(),
        registry.as_ref(),
        &config,
        out,
        ctx.interactive,
    );

    match publisher.publish(&request).await? {
        PublishOutcome::Released { version, tag } => {
            out.marker(&[
                ("result", "released"),
                ("version", &version.to_string()),
                ("tag", &tag),
            ]);
        }
        PublishOutcome::Skipped { reason } => {
            out.marker(&[("result", "skipped"), ("reason", &reason)]);
        }
        PublishOutcome::AlreadyPublished { version } => {
            out.marker(&[
                ("result", "already-published"),
                ("version", &version.to_string()),
            ]);
        }
    }
    Ok(())
}
