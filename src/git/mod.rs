//! Repository handle abstraction over git.
//!
//! The cache store never touches a clone's internals directly. Everything it needs from a
//! repository (clone, pull, checkout, health checks, ref listings) goes through the
//! [`GitBackend`] trait, which has two implementations:
//!
//! - [`SystemGit`] shells out to the `git` binary via [`GitCommand`]
//! - `FakeGit` (behind the `test-utils` feature) keeps repositories in memory so validation,
//!   repair and re-clone paths can be exercised without network access
//!
//! # Clone atomicity
//!
//! [`SystemGit::clone_repo`] clones into a sibling `.tmp-<uuid>` directory, validates the
//! result and only then renames it into place. An interrupted or cancelled clone therefore
//! never leaves a half-populated cache entry: the target is either absent or valid.

pub mod command_builder;

pub use command_builder::GitCommand;

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_FETCH_TIMEOUT};
use crate::core::PawnpmError;
use crate::utils::fs::remove_dir_all;

/// A tag together with the commit it peels to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub commit: String,
    /// Commit time as a unix timestamp; 0 when unknown.
    pub time: i64,
}

/// A branch tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub commit: String,
}

/// One failed health check of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoIssue {
    MissingGitDir,
    GitDirNotDirectory,
    HeadUnresolvable,
    HeadCommitMissing,
    StatusFailed,
    NoCommits,
    MissingObjects,
    MissingRefs,
}

impl fmt::Display for RepoIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RepoIssue::MissingGitDir => ".git directory does not exist",
            RepoIssue::GitDirNotDirectory => ".git is not a directory",
            RepoIssue::HeadUnresolvable => "HEAD cannot be resolved",
            RepoIssue::HeadCommitMissing => "HEAD commit object is missing",
            RepoIssue::StatusFailed => "working tree status cannot be read",
            RepoIssue::NoCommits => "repository has no commits",
            RepoIssue::MissingObjects => ".git/objects is missing",
            RepoIssue::MissingRefs => ".git/refs is missing",
        };
        f.write_str(text)
    }
}

/// Result of validating a clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoDiagnosis {
    pub issues: Vec<RepoIssue>,
}

impl RepoDiagnosis {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Converts an invalid diagnosis into a [`PawnpmError::GitRepoInvalid`].
    pub fn into_result(self, path: &Path) -> Result<(), PawnpmError> {
        if self.is_valid() {
            return Ok(());
        }
        Err(PawnpmError::GitRepoInvalid {
            path: path.display().to_string(),
            reason: self.to_string(),
        })
    }
}

impl fmt::Display for RepoDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return f.write_str("valid");
        }
        let issues: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        f.write_str(&issues.join(", "))
    }
}

/// Repository operations used by the cache store, the version resolver and the installer.
///
/// Paths are working-tree roots. `url` may be a remote URL or the path of another clone.
#[allow(async_fn_in_trait)]
pub trait GitBackend {
    /// Whether anything exists at `path`; says nothing about validity.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Clones `url` into `target`, which must not exist yet.
    async fn clone_repo(
        &self,
        url: &str,
        target: &Path,
        branch: Option<&str>,
        depth: Option<u32>,
    ) -> Result<()>;

    /// Fetches and moves the working tree to the tip of `branch`, or of the default branch.
    async fn pull(&self, path: &Path, branch: Option<&str>) -> Result<()>;

    /// Detached checkout of `commit`, discarding local modifications.
    async fn checkout(&self, path: &Path, commit: &str) -> Result<()>;

    async fn diagnose(&self, path: &Path) -> RepoDiagnosis;

    /// Non-destructive repair: hard reset to HEAD and remove untracked files.
    async fn repair(&self, path: &Path) -> Result<()>;

    async fn remove(&self, path: &Path) -> Result<()>;

    async fn list_tags(&self, path: &Path) -> Result<Vec<TagRef>>;

    async fn list_branches(&self, path: &Path) -> Result<Vec<BranchRef>>;

    /// Every reachable commit hash, newest first.
    async fn list_commits(&self, path: &Path) -> Result<Vec<String>>;

    async fn head_commit(&self, path: &Path) -> Result<String>;
}

/// [`GitBackend`] backed by the system `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemGit;

impl SystemGit {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn temp_sibling(target: &Path) -> PathBuf {
        let name = target.file_name().map_or_else(|| "clone".into(), |n| n.to_string_lossy());
        target.with_file_name(format!(".tmp-{name}-{}", uuid::Uuid::new_v4().simple()))
    }

    async fn default_branch(path: &Path) -> Result<String> {
        let head = GitCommand::remote_head().current_dir(path).execute_stdout().await?;
        Ok(head.strip_prefix("origin/").unwrap_or(&head).to_string())
    }
}

fn parse_time(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

impl GitBackend for SystemGit {
    async fn clone_repo(
        &self,
        url: &str,
        target: &Path,
        branch: Option<&str>,
        depth: Option<u32>,
    ) -> Result<()> {
        let parent = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        crate::utils::fs::ensure_dir(parent)?;

        let staging = Self::temp_sibling(target);
        debug!("Cloning {url} into {}", staging.display());

        let cloned = async {
            GitCommand::clone(url, &staging, branch, depth)
                .with_timeout(Some(GIT_CLONE_TIMEOUT))
                .with_context(url)
                .execute_success()
                .await?;
            // A clone of a cache entry only receives the entry's local branches
            if Path::new(url).is_dir() {
                GitCommand::fetch_cache_refs()
                    .current_dir(&staging)
                    .with_timeout(Some(GIT_FETCH_TIMEOUT))
                    .execute_success()
                    .await?;
            }
            self.diagnose(&staging).await.into_result(&staging)?;
            tokio::fs::rename(&staging, target)
                .await
                .with_context(|| format!("Failed to move clone into {}", target.display()))
        }
        .await;

        if cloned.is_err() {
            let _ = remove_dir_all(&staging);
        }
        cloned
    }

    async fn pull(&self, path: &Path, branch: Option<&str>) -> Result<()> {
        GitCommand::fetch()
            .current_dir(path)
            .with_timeout(Some(GIT_FETCH_TIMEOUT))
            .execute_success()
            .await?;

        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => Self::default_branch(path).await?,
        };
        GitCommand::checkout_branch(&branch).current_dir(path).execute_success().await
    }

    async fn checkout(&self, path: &Path, commit: &str) -> Result<()> {
        GitCommand::checkout_detached(commit).current_dir(path).execute_success().await
    }

    async fn diagnose(&self, path: &Path) -> RepoDiagnosis {
        let mut issues = Vec::new();
        let git_dir = path.join(".git");

        if !git_dir.exists() {
            issues.push(RepoIssue::MissingGitDir);
            return RepoDiagnosis { issues };
        }
        if !git_dir.is_dir() {
            issues.push(RepoIssue::GitDirNotDirectory);
            return RepoDiagnosis { issues };
        }
        if !git_dir.join("objects").is_dir() {
            issues.push(RepoIssue::MissingObjects);
        }
        if !git_dir.join("refs").is_dir() {
            issues.push(RepoIssue::MissingRefs);
        }

        if GitCommand::verify_commit("HEAD").current_dir(path).execute_success().await.is_err() {
            issues.push(RepoIssue::HeadUnresolvable);
        } else if GitCommand::object_exists("HEAD").current_dir(path).execute_success().await.is_err()
        {
            issues.push(RepoIssue::HeadCommitMissing);
        }

        if GitCommand::status().current_dir(path).execute_success().await.is_err() {
            issues.push(RepoIssue::StatusFailed);
        }

        let count = GitCommand::commit_count().current_dir(path).execute_stdout().await;
        if !count.is_ok_and(|count| count.parse::<u64>().is_ok_and(|n| n > 0)) {
            issues.push(RepoIssue::NoCommits);
        }

        RepoDiagnosis { issues }
    }

    async fn repair(&self, path: &Path) -> Result<()> {
        GitCommand::reset_hard().current_dir(path).execute_success().await?;
        GitCommand::clean().current_dir(path).execute_success().await
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || remove_dir_all(&path))
            .await
            .context("Removal task panicked")?
    }

    async fn list_tags(&self, path: &Path) -> Result<Vec<TagRef>> {
        let output = GitCommand::list_tags().current_dir(path).execute_stdout().await?;
        let tags = output
            .lines()
            .filter_map(|line| {
                let fields: Vec<&str> = line.split('\t').collect();
                let name = fields.first().filter(|n| !n.is_empty())?;
                let object = fields.get(1).copied().unwrap_or_default();
                let peeled = fields.get(2).copied().unwrap_or_default();
                let (commit, time) = if peeled.is_empty() {
                    (object, fields.get(3).copied().unwrap_or_default())
                } else {
                    (peeled, fields.get(4).copied().unwrap_or_default())
                };
                Some(TagRef {
                    name: (*name).to_string(),
                    commit: commit.to_string(),
                    time: parse_time(time).unwrap_or(0),
                })
            })
            .collect();
        Ok(tags)
    }

    async fn list_branches(&self, path: &Path) -> Result<Vec<BranchRef>> {
        let output = GitCommand::list_branches().current_dir(path).execute_stdout().await?;
        let mut branches: Vec<BranchRef> = Vec::new();
        for line in output.lines() {
            let Some((refname, commit)) = line.split_once('\t') else {
                continue;
            };
            let name = refname
                .strip_prefix("refs/remotes/origin/")
                .or_else(|| refname.strip_prefix("refs/heads/"));
            let Some(name) = name.filter(|n| *n != "HEAD") else {
                continue;
            };
            if branches.iter().any(|b| b.name == name) {
                continue;
            }
            branches.push(BranchRef {
                name: name.to_string(),
                commit: commit.to_string(),
            });
        }
        Ok(branches)
    }

    async fn list_commits(&self, path: &Path) -> Result<Vec<String>> {
        let output = GitCommand::list_commits().current_dir(path).execute_stdout().await?;
        Ok(output.lines().map(str::to_string).collect())
    }

    async fn head_commit(&self, path: &Path) -> Result<String> {
        GitCommand::current_commit().current_dir(path).execute_stdout().await
    }
}
