//! Vendoring of a resolved dependency graph into a project.
//!
//! Every entry of a [`DependencyGraph`] ends up as a working tree under
//! `<project>/dependencies/<repo>`, cloned from its cache entry (never from the network) and
//! checked out at the locked commit or at its declared constraint.
//!
//! # Per-dependency steps
//!
//! 1. Apply the locked commit, unless `force_update` is set or the lock entry is outdated for
//!    the declared constraint
//! 2. Make sure the cache entry exists
//! 3. Validate the vendored copy and remove it when invalid
//! 4. Clone the vendored copy from the cache entry
//! 5. Check out the resolved ref, escalating through repair, forced update and re-clone
//! 6. Record the resolution under the declared constraint
//!
//! Steps 1 to 5 run inside a constant-backoff retry ([`ENSURE_RETRIES`] retry,
//! [`ENSURE_RETRY_DELAY_MS`] ms). A dependency that still fails is logged and skipped; nothing
//! is recorded for it. Local scheme dependencies are only checked for existence and recorded
//! with a content hash when they are directories.
//!
//! After the walk, lock entries without a counterpart in the graph are pruned and the lockfile
//! is written if anything changed.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, CloneSpec};
use crate::constants::{ENSURE_RETRIES, ENSURE_RETRY_DELAY_MS, VENDOR_DIR};
use crate::core::{PawnpmError, wrap_git_error};
use crate::dependency::{Dependency, GitDependency};
use crate::git::GitBackend;
use crate::lockfile::{LockfileSession, directory_integrity};
use crate::resolver::{DependencyGraph, GraphEntry};
use crate::utils::progress::ProgressBar;
use crate::utils::retry_with_fixed_backoff;
use crate::version::ResolvedRef;

/// What a successful ensure produced for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Git {
        commit: String,
        head_tag: Option<String>,
    },
    Local {
        integrity: Option<String>,
    },
}

/// Summary of one [`Installer::ensure_dependencies`] run.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Rendered dependencies that were vendored or verified
    pub installed: Vec<String>,
    /// Rendered dependencies that failed, with the rendered error chain
    pub failed: Vec<(String, String)>,
    /// Lock keys removed because they left the graph
    pub pruned: Vec<String>,
    pub lockfile_saved: bool,
}

impl InstallReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Vendors graph entries into a project directory.
pub struct Installer<'a, G: GitBackend> {
    cache: &'a CacheStore<G>,
    project_dir: PathBuf,
    vendor_dir: PathBuf,
}

impl<'a, G: GitBackend> Installer<'a, G> {
    pub fn new(cache: &'a CacheStore<G>, project_dir: &Path) -> Self {
        Self {
            cache,
            project_dir: project_dir.to_path_buf(),
            vendor_dir: project_dir.join(VENDOR_DIR),
        }
    }

    #[must_use]
    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    /// Vendors every entry of `graph`, recording resolutions in `lock`.
    ///
    /// Individual failures do not abort the run; they are reported in
    /// [`InstallReport::failed`]. Only saving the lockfile can fail the whole call.
    pub async fn ensure_dependencies(
        &self,
        graph: &DependencyGraph,
        lock: &mut LockfileSession,
        force_update: bool,
    ) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        let progress = ProgressBar::new(graph.len() as u64);
        let delay = Duration::from_millis(ENSURE_RETRY_DELAY_MS);

        for entry in &graph.dependencies {
            let label = entry.dependency.to_string();
            progress.set_message(format!("Ensuring {label}"));

            let session: &LockfileSession = lock;
            let outcome = retry_with_fixed_backoff(&label, ENSURE_RETRIES, delay, async || {
                self.ensure_entry(entry, session, force_update).await
            })
            .await;

            match outcome {
                Ok(outcome) => {
                    record(lock, entry, outcome);
                    report.installed.push(label);
                }
                Err(e) => {
                    warn!("Failed to ensure {label}: {e:#}");
                    report.failed.push((label, format!("{e:#}")));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        report.pruned = lock.prune_missing(&graph.keys());
        report.lockfile_saved = lock.save()?;
        info!(
            "ensured {} dependencies ({} failed)",
            report.installed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn ensure_entry(
        &self,
        entry: &GraphEntry,
        lock: &LockfileSession,
        force_update: bool,
    ) -> Result<Outcome> {
        let declared = &entry.dependency;
        if let Dependency::LocalScheme { path, .. } = declared {
            return self.ensure_local(path);
        }

        let Some(git) = declared.git() else {
            bail!("{declared} has no repository to vendor");
        };
        // A lock pin only changes what is checked out; the cache entry and the vendor clone
        // still follow the declared branch so the locked commit is reachable
        let pinned = if force_update || lock.is_outdated(declared) {
            None
        } else {
            Some(lock.locked_dependency(declared))
        };
        let checkout = pinned.as_ref().and_then(Dependency::git).unwrap_or(git);

        let cache_path = self.cache.ensure(git, force_update).await?;
        self.vendor_from_cache(git, checkout, &cache_path)
            .await
            .map_err(|e| wrap_git_error(e, git))
    }

    fn ensure_local(&self, path: &str) -> Result<Outcome> {
        let full = self.project_dir.join(path);
        if !full.exists() {
            bail!("local dependency path does not exist: {}", full.display());
        }
        let integrity = if full.is_dir() {
            Some(directory_integrity(&full)?)
        } else {
            None
        };
        Ok(Outcome::Local { integrity })
    }

    /// Clones the cache entry of `source` into the vendor directory and checks out `checkout`,
    /// which is `source` itself or its lock-pinned form.
    async fn vendor_from_cache(
        &self,
        source: &GitDependency,
        checkout: &GitDependency,
        cache_path: &Path,
    ) -> Result<Outcome> {
        let vendor = self.vendor_dir.join(&source.repo);
        let url = cache_path.display().to_string();
        let spec = CloneSpec {
            url: &url,
            branch: source.constraint.branch(),
            depth: None,
        };

        self.cache.ensure_clone(&spec, &vendor, false).await?;
        let resolved = self.checkout_with_recovery(&spec, &vendor, checkout).await?;

        let backend = self.cache.git();
        let commit = backend.head_commit(&vendor).await?;
        let head_tag = match resolved.and_then(|r| r.tag) {
            Some(tag) => Some(tag),
            None => backend
                .list_tags(&vendor)
                .await?
                .into_iter()
                .find(|tag| tag.commit == commit)
                .map(|tag| tag.name),
        };
        debug!("{checkout}: vendored at {commit}");
        Ok(Outcome::Git { commit, head_tag })
    }

    /// Checks out `git`'s constraint in `vendor`: plain attempt, then after a repair, then after
    /// a forced update that itself falls back to a re-clone.
    ///
    /// A constraint that matches nothing is returned as is; no amount of repair changes that.
    async fn checkout_with_recovery(
        &self,
        spec: &CloneSpec<'_>,
        vendor: &Path,
        git: &GitDependency,
    ) -> Result<Option<ResolvedRef>> {
        let first = match self.cache.checkout(vendor, git).await {
            Ok(resolved) => return Ok(resolved),
            Err(e) if is_resolution_failure(&e) => return Err(e),
            Err(e) => e,
        };
        debug!("{git}: checkout failed, repairing: {first:#}");

        if self.cache.git().repair(vendor).await.is_ok() {
            if let Ok(resolved) = self.cache.checkout(vendor, git).await {
                return Ok(resolved);
            }
        }

        warn!("{git}: repair did not help, forcing an update of {}", vendor.display());
        self.cache.update(spec, vendor).await?;
        self.cache
            .checkout(vendor, git)
            .await
            .with_context(|| format!("Failed to check out {git} after repair and re-clone"))
    }
}

fn is_resolution_failure(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<PawnpmError>(),
            Some(
                PawnpmError::TagNotFound { .. }
                    | PawnpmError::BranchNotFound { .. }
                    | PawnpmError::CommitNotFound { .. }
            )
        )
    })
}

fn record(lock: &mut LockfileSession, entry: &GraphEntry, outcome: Outcome) {
    match outcome {
        Outcome::Git { commit, head_tag } => lock.record_resolution(
            &entry.dependency,
            &commit,
            head_tag.as_deref(),
            entry.is_transitive(),
            entry.required_by.as_deref(),
        ),
        Outcome::Local { integrity } => lock.record_local_dependency(&entry.dependency, integrity),
    }
}
