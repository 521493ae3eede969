//! Resolve the dependency graph and vendor every dependency.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use super::common::{CommandContext, load_overrides};
use super::pin::print_pinned;
use crate::installer::Installer;
use crate::pinner::{GitHubReleases, TaglessPinner};
use crate::resolver::GraphBuilder;
use crate::utils::Platform;

#[derive(Debug, Args)]
pub struct EnsureCommand {
    /// Pull every dependency and ignore locked commits
    #[arg(short, long)]
    pub update: bool,

    /// Neither read nor write pawn.lock
    #[arg(long)]
    pub no_lock: bool,

    /// Pin unconstrained dependencies to their latest tag first
    #[arg(long)]
    pub pin: bool,

    /// Target platform for resources: windows or linux (defaults to the host)
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,
}

impl EnsureCommand {
    pub async fn execute(self, project_dir: Option<PathBuf>) -> Result<()> {
        let mut ctx = CommandContext::load(project_dir)?;
        let platform = match &self.platform {
            Some(name) => name.parse()?,
            None => Platform::host(),
        };
        let cache = ctx.cache_store()?;
        let overrides = load_overrides().await?;

        if self.pin {
            let releases = GitHubReleases::from_env()?;
            let pinned = TaglessPinner::new(&cache, &overrides, &releases)
                .platform(platform)
                .pin_unconstrained(&mut ctx.package)
                .await?;
            print_pinned(&pinned);
        }

        let mut lock = ctx.open_lockfile(!self.no_lock)?;
        if self.update {
            lock.force_update();
        }

        info!("resolving dependencies of {} for {platform}", ctx.package);
        let graph = GraphBuilder::new(&cache, &overrides, &ctx.project_dir)
            .platform(platform)
            .force_update(self.update)
            .build(&ctx.package)
            .await?;

        let report = Installer::new(&cache, &ctx.project_dir)
            .ensure_dependencies(&graph, &mut lock, self.update)
            .await?;

        for (dependency, error) in &report.failed {
            eprintln!("{} {dependency}: {error}", "✗".red());
        }
        println!(
            "{} Ensured {} dependencies ({} plugins, {} include paths)",
            "✓".green(),
            report.installed.len(),
            graph.plugins.len(),
            graph.include_paths.len()
        );
        if !report.pruned.is_empty() {
            println!("  Removed {} stale lock entries", report.pruned.len());
        }
        if report.lockfile_saved {
            println!("  Updated pawn.lock");
        }

        if !report.is_success() {
            bail!("{} of {} dependencies could not be ensured", report.failed.len(), graph.len());
        }
        Ok(())
    }
}
