//! List declared dependencies whose constraint no longer matches `pawn.lock`.
//!
//! A dependency is outdated when it has no lock entry or when its declared constraint
//! (`:tag`, `@branch`, `#commit`) differs from the one it was locked under. Running
//! `pawnpm ensure` re-locks it.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use super::common::CommandContext;
use crate::dependency::parse_specifier;
use crate::lockfile::LockFile;
use crate::package::Package;

#[derive(Debug, Args)]
pub struct OutdatedCommand {
    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Exit with an error when anything is outdated
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedInfo {
    pub dependency: String,
    pub declared: String,
    /// Constraint recorded in the lockfile; `None` when the dependency is not locked
    pub locked: Option<String>,
    pub commit: Option<String>,
}

/// Outdated root dependencies of `package` against `lockfile`.
///
/// Overrides are not applied; the comparison is between what the definition says and what was
/// recorded for that identity.
pub fn find_outdated(package: &Package, lockfile: &LockFile) -> Vec<OutdatedInfo> {
    let mut outdated = Vec::new();
    for raw in package.all_dependencies() {
        let dependency = match parse_specifier(&raw) {
            Ok(dependency) => dependency,
            Err(e) => {
                warn!("Skipping invalid dependency '{raw}': {e}");
                continue;
            }
        };
        if !lockfile.is_outdated(&dependency) {
            continue;
        }
        let locked = lockfile.get(&dependency);
        outdated.push(OutdatedInfo {
            dependency: raw,
            declared: dependency.constraint_string(),
            locked: locked.map(|l| l.constraint.clone()),
            commit: locked.map(|l| l.commit.clone()).filter(|c| !c.is_empty()),
        });
    }
    outdated
}

impl OutdatedCommand {
    pub fn execute(self, project_dir: Option<PathBuf>) -> Result<()> {
        let ctx = CommandContext::load(project_dir)?;
        let Some(lockfile) = LockFile::load(&ctx.project_dir)? else {
            bail!(
                "No lockfile found in {}. Run 'pawnpm ensure' first to create one.",
                ctx.project_dir.display()
            );
        };

        let outdated = find_outdated(&ctx.package, &lockfile);
        if self.format == "json" {
            println!("{}", serde_json::to_string_pretty(&outdated)?);
        } else if outdated.is_empty() {
            println!("{} All dependencies match pawn.lock", "✓".green());
        } else {
            println!("{:<40} {:<16} {:<16} {}", "Dependency", "Declared", "Locked", "Commit");
            for info in &outdated {
                println!(
                    "{:<40} {:<16} {:<16} {}",
                    info.dependency.yellow(),
                    display_constraint(&info.declared),
                    info.locked.as_deref().map_or_else(|| "-".to_string(), display_constraint),
                    info.commit.as_deref().map_or("-", |c| &c[..c.len().min(8)])
                );
            }
        }

        if self.check && !outdated.is_empty() {
            bail!("{} dependencies are out of date with pawn.lock", outdated.len());
        }
        Ok(())
    }
}

fn display_constraint(constraint: &str) -> String {
    if constraint.is_empty() {
        "latest".to_string()
    } else {
        constraint.to_string()
    }
}
