//! pawnpm CLI entry point
//!
//! Parses arguments, installs the tracing subscriber and runs the command. Errors are
//! rendered through [`user_friendly_error`] and exit with status 1.

use anyhow::Result;
use clap::Parser;
use pawnpm_cli::cli;
use pawnpm_cli::core::error::user_friendly_error;
use tracing_subscriber::EnvFilter;

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let config = cli.build_config();
    init_logging(config.log_level.as_deref());

    match cli.execute_with_config(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
