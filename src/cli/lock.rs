use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::common::project_dir;
use crate::lockfile::{LockFile, LockedDependency};

#[derive(Debug, Args)]
pub struct LockCommand {
    #[command(subcommand)]
    command: LockSubcommand,
}

#[derive(Debug, Subcommand)]
enum LockSubcommand {
    /// Print the locked dependencies
    Show {
        /// Print the raw lockfile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete pawn.lock so the next ensure resolves from scratch
    Clear,
}

impl LockCommand {
    pub fn execute(self, explicit_dir: Option<PathBuf>) -> Result<()> {
        let dir = project_dir(explicit_dir)?;
        match self.command {
            LockSubcommand::Show { json } => {
                let Some(lockfile) = LockFile::load(&dir)? else {
                    bail!("No lockfile found in {}", dir.display());
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&lockfile)?);
                } else {
                    print_lockfile(&lockfile);
                }
                Ok(())
            }
            LockSubcommand::Clear => {
                LockFile::delete(&dir)?;
                println!("{} Removed {}", "✓".green(), LockFile::path(&dir).display());
                Ok(())
            }
        }
    }
}

fn print_lockfile(lockfile: &LockFile) {
    println!(
        "{} (version {}, generated {} by {})",
        "pawn.lock".bold(),
        lockfile.version,
        lockfile.generated.format("%Y-%m-%d %H:%M:%S UTC"),
        lockfile.tool_version
    );

    let direct: Vec<_> = lockfile.direct_dependencies().collect();
    let transitive: Vec<_> = lockfile.transitive_dependencies().collect();
    println!("\n{} ({})", "Direct dependencies".bold(), direct.len());
    for (key, locked) in direct {
        println!("  {}", describe(key, locked));
    }
    println!("\n{} ({})", "Transitive dependencies".bold(), transitive.len());
    for (key, locked) in transitive {
        println!("  {}", describe(key, locked));
        if !locked.required_by.is_empty() {
            println!("    {} {}", "required by".dimmed(), locked.required_by.join(", "));
        }
    }

    if let Some(runtime) = &lockfile.runtime {
        println!("\n{} {} ({})", "Runtime".bold(), runtime.version, runtime.platform);
    }
}

/// `key resolved (commit)` for git entries, `key [integrity]` for local ones.
fn describe(key: &str, locked: &LockedDependency) -> String {
    if locked.commit.is_empty() {
        if locked.integrity.is_empty() {
            return key.to_string();
        }
        return format!("{key} [{}]", locked.integrity);
    }
    let short = &locked.commit[..locked.commit.len().min(8)];
    format!("{} {} ({})", key.cyan(), locked.resolved, short.dimmed())
}
