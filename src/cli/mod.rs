//! Command-line interface for pawnpm.
//!
//! Each command lives in its own module with its own argument struct and an `execute` method.
//!
//! # Available Commands
//!
//! - `ensure` - resolve the dependency graph and vendor every dependency
//! - `pin` - pin unconstrained dependencies to their latest tag
//! - `outdated` - list declared dependencies whose constraint changed since locking
//! - `lock` - inspect or remove `pawn.lock`
//! - `overrides` - manage dependency overrides
//!
//! # Basic Workflow
//!
//! ```bash
//! # Vendor dependencies into ./dependencies and write pawn.lock
//! pawnpm ensure
//!
//! # Pin `owner/repo` declarations to their latest release first
//! pawnpm ensure --pin
//!
//! # Ignore locked commits and pull everything
//! pawnpm ensure --update
//!
//! # Redirect a moved repository
//! pawnpm overrides add Zeex/samp-plugin-crashdetect AmyrAhmady/samp-plugin-crashdetect
//! ```
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Only report errors
//! - `--no-progress` - Disable progress bars
//! - `--project-dir` - Project directory instead of the current one

pub mod common;
mod ensure;
mod lock;
mod outdated;
mod overrides;
mod pin;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::progress::disable_progress;

/// Settings derived from global flags, applied once before a command runs.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Filter directive for the tracing subscriber; `None` defers to `RUST_LOG`
    pub log_level: Option<String>,

    pub no_progress: bool,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self) {
        if self.no_progress {
            disable_progress();
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pawnpm",
    about = "Package manager for Pawn projects",
    version,
    long_about = "pawnpm resolves Pawn dependencies from git repositories, vendors them into the \
                  project and records the resolved commits in pawn.lock."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    project_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and vendor all dependencies
    Ensure(ensure::EnsureCommand),

    /// Pin unconstrained dependencies to their latest tag
    Pin(pin::PinCommand),

    /// List dependencies whose declared constraint differs from the lockfile
    Outdated(outdated::OutdatedCommand),

    /// Inspect the lockfile
    Lock(lock::LockCommand),

    /// Manage dependency overrides
    Overrides(overrides::OverridesCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// `--verbose` maps to `debug`, `--quiet` to `error`, otherwise `RUST_LOG` decides.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress || self.quiet,
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply();

        match self.command {
            Commands::Ensure(cmd) => cmd.execute(self.project_dir).await,
            Commands::Pin(cmd) => cmd.execute(self.project_dir).await,
            Commands::Outdated(cmd) => cmd.execute(self.project_dir),
            Commands::Lock(cmd) => cmd.execute(self.project_dir),
            Commands::Overrides(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_from_flags() {
        let cli = Cli::parse_from(["pawnpm", "--verbose", "ensure"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

        let cli = Cli::parse_from(["pawnpm", "lock", "show", "--quiet"]);
        let config = cli.build_config();
        assert_eq!(config.log_level.as_deref(), Some("error"));
        assert!(config.no_progress);

        let cli = Cli::parse_from(["pawnpm", "outdated"]);
        assert_eq!(cli.build_config().log_level, None);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["pawnpm", "-v", "-q", "ensure"]).is_err());
    }

    #[test]
    fn test_ensure_flags() {
        let cli = Cli::parse_from([
            "pawnpm",
            "ensure",
            "--update",
            "--no-lock",
            "--pin",
            "--platform",
            "windows",
            "--project-dir",
            "/tmp/project",
        ]);
        assert_eq!(cli.project_dir, Some(PathBuf::from("/tmp/project")));
        let Commands::Ensure(cmd) = cli.command else {
            panic!("expected ensure");
        };
        assert!(cmd.update && cmd.no_lock && cmd.pin);
        assert_eq!(cmd.platform.as_deref(), Some("windows"));
    }
}
