//! Type-safe Git command builder for consistent command execution
//!
//! Every git invocation made by [`SystemGit`](super::SystemGit) goes through [`GitCommand`]:
//! it runs `git -C <dir> ...` on `tokio::process`, applies a timeout, disables interactive
//! credential prompts and converts failures into typed [`PawnpmError`] values carrying git's
//! stderr.
//!
//! Commands log under the `git` tracing target; anything slower than 100ms is also reported
//! under `git::perf`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::GIT_LOCAL_TIMEOUT;
use crate::core::PawnpmError;
use crate::utils::platform::get_git_command;

const HEADS_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";
const CACHE_REFSPEC: &str = "+refs/remotes/origin/*:refs/remotes/cache/*";

/// Builder for a single git invocation.
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // A credential prompt would otherwise block the walk until the timeout fires
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(GIT_LOCAL_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the command against `dir` through `git -C`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// `None` disables the timeout.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label included in log lines, usually the dependency name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn full_args(&self) -> Vec<String> {
        let mut full_args = Vec::with_capacity(self.args.len() + 2);
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            // Use the path as-is to avoid symlink resolution issues on macOS
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        full_args
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn label(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let full_args = self.full_args();
        let label = self.label();

        let mut cmd = Command::new(git_command);
        cmd.args(&full_args).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        tracing::debug!(target: "git", "{label}Executing command: {git_command} {}", full_args.join(" "));

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "{label}Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(PawnpmError::GitCommandError {
                        operation: self.operation(),
                        stderr: format!(
                            "git command timed out after {} seconds; try running it manually: git {}",
                            duration.as_secs(),
                            full_args.join(" ")
                        ),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PawnpmError::GitNotFound.into());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to execute git {}", full_args.join(" ")));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{label}Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{label}Error: {}", stderr.trim());
            }

            let error = match self.args.first().map(String::as_str) {
                Some("clone") => PawnpmError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason: stderr.trim().to_string(),
                },
                Some("checkout") => PawnpmError::GitCheckoutFailed {
                    reference: self.args.last().cloned().unwrap_or_default(),
                    reason: stderr.trim().to_string(),
                },
                _ => PawnpmError::GitCommandError {
                    operation: self.operation(),
                    stderr: if stderr.trim().is_empty() {
                        stdout.trim().to_string()
                    } else {
                        stderr.trim().to_string()
                    },
                },
            };
            return Err(error.into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "{label}Git {} took {:.2}s", self.operation(), elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "{label}Git {} took {}ms", self.operation(), elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Runs the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// Convenience builders for the operations the cache store needs

impl GitCommand {
    /// `git clone` with bounded history. All branches are fetched so branch lookups can list
    /// every candidate.
    pub fn clone(url: &str, target: impl AsRef<Path>, branch: Option<&str>, depth: Option<u32>) -> Self {
        let mut cmd = Self::new().arg("clone").arg("--quiet");
        if let Some(depth) = depth {
            cmd = cmd.args(["--depth".to_string(), depth.to_string(), "--no-single-branch".to_string()]);
        }
        if let Some(branch) = branch {
            cmd = cmd.args(["--branch", branch]);
        }
        cmd = cmd.arg(url).arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Fetches branches and tags from `origin`. When `origin` is a cache entry, its own
    /// remote-tracking branches land under `refs/remotes/cache/` so commits that only exist on
    /// a non-default upstream branch stay reachable.
    pub fn fetch() -> Self {
        Self::new().args([
            "fetch",
            "--tags",
            "--force",
            "--prune",
            "origin",
            HEADS_REFSPEC,
            CACHE_REFSPEC,
        ])
    }

    /// Copies the remote-tracking branches of a local `origin` into `refs/remotes/cache/`.
    pub fn fetch_cache_refs() -> Self {
        Self::new().args(["fetch", "--quiet", "origin", CACHE_REFSPEC])
    }

    /// Points local `branch` at `origin/<branch>` and checks it out, discarding local edits.
    pub fn checkout_branch(branch: &str) -> Self {
        Self::new().args(["checkout", "--force", "-B", branch, &format!("origin/{branch}")])
    }

    /// Detached checkout of an exact commit.
    pub fn checkout_detached(commit: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", commit])
    }

    /// `refs/remotes/origin/HEAD`, naming the default branch.
    pub fn remote_head() -> Self {
        Self::new().args(["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
    }

    pub fn reset_hard() -> Self {
        Self::new().args(["reset", "--hard", "HEAD"])
    }

    pub fn clean() -> Self {
        Self::new().args(["clean", "-fd"])
    }

    /// Tags with their peeled commit and commit time, tab separated.
    pub fn list_tags() -> Self {
        Self::new().args([
            "for-each-ref",
            "--format=%(refname:short)%09%(objectname)%09%(*objectname)%09%(committerdate:unix)%09%(*committerdate:unix)",
            "refs/tags",
        ])
    }

    /// Local and remote-tracking branches with their tip commit.
    pub fn list_branches() -> Self {
        Self::new().args([
            "for-each-ref",
            "--format=%(refname)%09%(objectname)",
            "refs/heads",
            "refs/remotes/origin",
        ])
    }

    pub fn list_commits() -> Self {
        Self::new().args(["rev-list", "--all"])
    }

    pub fn verify_commit(reference: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", &format!("{reference}^{{commit}}")])
    }

    pub fn object_exists(reference: &str) -> Self {
        Self::new().args(["cat-file", "-e", &format!("{reference}^{{commit}}")])
    }

    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    pub fn commit_count() -> Self {
        Self::new().args(["rev-list", "--count", "--all"])
    }

    pub fn status() -> Self {
        Self::new().args(["status", "--porcelain"])
    }
}
