//! Shared setup for commands that operate on a project.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cache::CacheStore;
use crate::config::{get_cache_dir, get_config_dir};
use crate::core::PawnpmError;
use crate::git::SystemGit;
use crate::lockfile::LockfileSession;
use crate::overrides::{HttpOverrideSource, OverrideTable};
use crate::package::Package;
use crate::utils::platform::{command_exists, get_git_command};

/// Resolves `--project-dir`, falling back to the working directory.
pub fn project_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to determine the current directory"),
    }
}

/// A loaded project: its directory and root package definition.
#[derive(Debug)]
pub struct CommandContext {
    pub project_dir: PathBuf,
    pub package: Package,
}

impl CommandContext {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let project_dir = project_dir(explicit)?;
        let package = Package::load(&project_dir).with_context(|| {
            format!("Failed to load the package definition in {}", project_dir.display())
        })?;
        Ok(Self {
            project_dir,
            package,
        })
    }

    /// Cache store over the system `git` rooted at the configured cache directory.
    pub fn cache_store(&self) -> Result<CacheStore<SystemGit>> {
        if !command_exists(get_git_command()) {
            return Err(PawnpmError::GitNotFound.into());
        }
        Ok(CacheStore::new(SystemGit::new(), get_cache_dir()?))
    }

    pub fn open_lockfile(&self, enabled: bool) -> Result<LockfileSession> {
        LockfileSession::open(&self.project_dir, self.package.format, enabled)
    }
}

/// Built-in, remote and local overrides, in increasing precedence.
pub async fn load_overrides() -> Result<OverrideTable> {
    let config_dir = get_config_dir()?;
    let source = HttpOverrideSource::from_env()?;
    Ok(OverrideTable::load(&config_dir, &source).await)
}
