//! Git repository cache with validation, repair and bounded re-clone.
//!
//! # Cache Directory Structure
//!
//! ```text
//! ~/.pawnpm/cache/
//! └── packages/
//!     └── <owner>/<repo>/
//!         ├── default/     # clone following the default branch
//!         └── <branch>/    # one clone per explicitly requested branch
//! ```
//!
//! Paths are a pure function of the dependency (see [`GitDependency::cache_path`]): no hashing,
//! so entries can be inspected or deleted by hand.
//!
//! # Trust model
//!
//! A cache entry is only trusted after [`GitBackend::diagnose`] reports it valid. Invalid
//! entries are removed and cloned again. Updates escalate in bounded steps:
//!
//! 1. pull
//! 2. non-destructive repair (hard reset, clean) followed by one more pull
//! 3. delete and re-clone, at most [`MAX_RECLONE_ATTEMPTS`] times
//!
//! Failures that survive every step are wrapped with the dependency's name.
//!
//! The same machinery maintains vendored copies inside a project, which are cloned from the
//! cache entry rather than from the network.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{CLONE_DEPTH, MAX_RECLONE_ATTEMPTS};
use crate::core::{PawnpmError, wrap_git_error};
use crate::dependency::{Constraint, GitDependency};
use crate::git::GitBackend;
use crate::version::{ResolvedRef, resolve_ref};

/// Where a clone comes from and how it is laid out.
#[derive(Debug, Clone, Copy)]
pub struct CloneSpec<'a> {
    pub url: &'a str,
    pub branch: Option<&'a str>,
    pub depth: Option<u32>,
}

/// Owns the on-disk cache of dependency clones.
pub struct CacheStore<G: GitBackend> {
    git: G,
    cache_dir: PathBuf,
}

impl<G: GitBackend> CacheStore<G> {
    pub fn new(git: G, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            git,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the cache entry for `dependency`.
    pub fn entry_path(&self, dependency: &GitDependency) -> PathBuf {
        dependency.cache_path(&self.cache_dir)
    }

    /// True when an entry directory exists; it may still be invalid.
    pub fn is_cached(&self, dependency: &GitDependency) -> bool {
        self.git.exists(&self.entry_path(dependency).join(".git"))
    }

    /// Makes sure a valid cache entry exists for `dependency` and returns its path.
    ///
    /// With `force_update` an existing entry is pulled, escalating through repair and
    /// re-clone on failure.
    pub async fn ensure(&self, dependency: &GitDependency, force_update: bool) -> Result<PathBuf> {
        let path = self.entry_path(dependency);
        let url = dependency.url();
        let spec = CloneSpec {
            url: &url,
            branch: dependency.constraint.branch(),
            depth: Some(CLONE_DEPTH),
        };
        self.ensure_clone(&spec, &path, force_update)
            .await
            .map_err(|e| wrap_git_error(e, dependency))?;
        Ok(path)
    }

    /// Makes sure `target` is a valid clone of `spec.url`.
    pub async fn ensure_clone(&self, spec: &CloneSpec<'_>, target: &Path, force_update: bool) -> Result<()> {
        if self.git.exists(target) {
            let diagnosis = self.git.diagnose(target).await;
            if !diagnosis.is_valid() {
                warn!(
                    "Repository at {} is invalid ({diagnosis}), removing it for a fresh clone",
                    target.display()
                );
                self.git.remove(target).await?;
            }
        }

        if !self.git.exists(target) {
            debug!("Cloning {} into {}", spec.url, target.display());
            return self.git.clone_repo(spec.url, target, spec.branch, spec.depth).await;
        }

        if force_update {
            self.update(spec, target).await?;
        }
        Ok(())
    }

    /// Pull with repair and re-clone escalation.
    pub async fn update(&self, spec: &CloneSpec<'_>, target: &Path) -> Result<()> {
        let pull_error = match self.git.pull(target, spec.branch).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        debug!("Pull of {} failed: {pull_error:#}", target.display());

        match self.git.repair(target).await {
            Ok(()) => match self.git.pull(target, spec.branch).await {
                Ok(()) => {
                    debug!("Repository at {} repaired", target.display());
                    return Ok(());
                }
                Err(e) => debug!("Pull after repair failed: {e:#}"),
            },
            Err(e) => debug!("Repair of {} failed: {e:#}", target.display()),
        }

        self.reclone(spec, target).await.with_context(|| {
            format!("Failed to update {} after pull error: {pull_error}", target.display())
        })
    }

    /// Deletes `target` and clones it again, at most [`MAX_RECLONE_ATTEMPTS`] times.
    pub async fn reclone(&self, spec: &CloneSpec<'_>, target: &Path) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=MAX_RECLONE_ATTEMPTS {
            warn!("Re-cloning {} (attempt {attempt})", target.display());
            self.git.remove(target).await?;
            match self.git.clone_repo(spec.url, target, spec.branch, spec.depth).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            PawnpmError::GitRepoInvalid {
                path: target.display().to_string(),
                reason: "re-clone was not attempted".to_string(),
            }
            .into()
        }))
    }

    /// Moves the clone at `path` to the ref selected by `dependency`'s constraint.
    ///
    /// Unconstrained dependencies are pulled to the default branch tip and yield `None`.
    /// Branch constraints pull that branch. Tags and commits are looked up locally first and
    /// only fetched when missing.
    pub async fn checkout(&self, path: &Path, dependency: &GitDependency) -> Result<Option<ResolvedRef>> {
        match &dependency.constraint {
            Constraint::None => {
                self.git.pull(path, None).await?;
                Ok(None)
            }
            Constraint::Branch(branch) => {
                self.git.pull(path, Some(branch)).await?;
                resolve_ref(&self.git, path, dependency).await
            }
            Constraint::Tag(_) | Constraint::Commit(_) => {
                let resolved = match resolve_ref(&self.git, path, dependency).await {
                    Ok(resolved) => resolved,
                    Err(e) if is_missing_ref(&e) => {
                        debug!("{dependency}: ref not present locally, fetching");
                        self.git.pull(path, None).await?;
                        resolve_ref(&self.git, path, dependency).await?
                    }
                    Err(e) => return Err(e),
                };
                if let Some(resolved) = &resolved {
                    self.git.checkout(path, &resolved.commit).await?;
                    debug!("{dependency}: checked out {}", resolved.commit);
                }
                Ok(resolved)
            }
        }
    }
}

fn is_missing_ref(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<PawnpmError>(),
        Some(PawnpmError::TagNotFound { .. } | PawnpmError::CommitNotFound { .. })
    )
}
