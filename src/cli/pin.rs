use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, load_overrides};
use crate::pinner::{GitHubReleases, PinnedDependency, TaglessPinner};

#[derive(Debug, Args)]
pub struct PinCommand {}

impl PinCommand {
    pub async fn execute(self, project_dir: Option<PathBuf>) -> Result<()> {
        let mut ctx = CommandContext::load(project_dir)?;
        let cache = ctx.cache_store()?;
        let overrides = load_overrides().await?;
        let releases = GitHubReleases::from_env()?;

        let pinned = TaglessPinner::new(&cache, &overrides, &releases)
            .pin_unconstrained(&mut ctx.package)
            .await?;
        print_pinned(&pinned);
        Ok(())
    }
}

pub(super) fn print_pinned(pinned: &[PinnedDependency]) {
    if pinned.is_empty() {
        println!("All dependencies are already pinned");
        return;
    }
    for pin in pinned {
        println!("{} {} {} {}", "✓".green(), pin.from, "→".dimmed(), pin.to.cyan());
    }
}
