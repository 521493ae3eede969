//! Manage dependency overrides.
//!
//! `list` shows the merged table (built-in, remote feed, local file). `add` and `remove` edit
//! only the local file at `<config_dir>/dependency-overrides.json`, which takes precedence over
//! the other layers. `clear-cache` forces the remote feed to be fetched again.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;

use super::common::load_overrides;
use crate::config::get_config_dir;
use crate::dependency::parse_specifier;
use crate::overrides::{clear_remote_cache, load_local, local_overrides_path, save_local};

#[derive(Debug, Args)]
pub struct OverridesCommand {
    #[command(subcommand)]
    command: OverridesSubcommand,
}

#[derive(Debug, Subcommand)]
enum OverridesSubcommand {
    /// Show active overrides
    List {
        /// Only show the local override file
        #[arg(long)]
        local: bool,
    },
    /// Redirect ORIGINAL to REPLACEMENT
    Add {
        original: String,
        replacement: String,
    },
    /// Remove a local override
    Remove { original: String },
    /// Delete the cached remote override feed
    ClearCache,
}

impl OverridesCommand {
    pub async fn execute(self) -> Result<()> {
        let config_dir = get_config_dir()?;
        match self.command {
            OverridesSubcommand::List { local } => {
                let entries = if local {
                    load_local(&config_dir)?
                } else {
                    load_overrides().await?.entries().clone()
                };
                print_entries(&entries);
            }
            OverridesSubcommand::Add {
                original,
                replacement,
            } => {
                parse_specifier(&replacement)
                    .with_context(|| format!("Invalid override target '{replacement}'"))?;
                let mut entries = load_local(&config_dir)?;
                entries.insert(original.clone(), replacement.clone());
                save_local(&config_dir, &entries)?;
                println!("{} {original} {} {replacement}", "✓".green(), "→".dimmed());
            }
            OverridesSubcommand::Remove { original } => {
                let mut entries = load_local(&config_dir)?;
                if entries.remove(&original).is_none() {
                    bail!(
                        "No local override for '{original}' in {}",
                        local_overrides_path(&config_dir).display()
                    );
                }
                save_local(&config_dir, &entries)?;
                println!("{} Removed override for {original}", "✓".green());
            }
            OverridesSubcommand::ClearCache => {
                clear_remote_cache(&config_dir)?;
                println!("{} Cleared the remote override cache", "✓".green());
            }
        }
        Ok(())
    }
}

fn print_entries(entries: &BTreeMap<String, String>) {
    if entries.is_empty() {
        println!("No dependency overrides");
        return;
    }
    for (original, replacement) in entries {
        println!("{original} {} {replacement}", "→".dimmed());
    }
}
