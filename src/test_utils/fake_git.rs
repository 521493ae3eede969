//! In-memory [`GitBackend`] for tests.
//!
//! Remotes are described with [`FakeRepo`] and registered on a [`FakeGit`]. Clones are real
//! directories containing a skeleton `.git` (`objects`, `refs`) and the files of the checked
//! out commit, so package definitions are readable from disk exactly as with the system
//! backend. Refs, history and HEAD live in memory.
//!
//! Cloning from the path of an existing clone (the way vendored copies are made from the
//! cache) inherits that clone's remote.

use anyhow::{Result, anyhow, bail};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::constants::DEFAULT_SITE;
use crate::core::PawnpmError;
use crate::git::{BranchRef, GitBackend, RepoDiagnosis, RepoIssue, TagRef};

const DEFAULT_BRANCH: &str = "main";
const BASE_TIME: i64 = 1_700_000_000;

#[derive(Debug, Clone)]
struct FakeCommit {
    sha: String,
    time: i64,
    files: BTreeMap<String, String>,
}

/// Description of a remote repository: linear history plus tags and branches.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    site: String,
    owner: String,
    repo: String,
    commits: Vec<FakeCommit>,
    tags: Vec<(String, usize)>,
    branches: Vec<(String, usize)>,
}

impl FakeRepo {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            commits: Vec::new(),
            tags: Vec::new(),
            branches: Vec::new(),
        }
    }

    #[must_use]
    pub fn on_site(mut self, site: &str) -> Self {
        self.site = site.to_string();
        self
    }

    /// Appends a commit carrying over the previous commit's files.
    #[must_use]
    pub fn with_commit(mut self, message: &str) -> Self {
        let index = self.commits.len();
        let files = self.commits.last().map(|c| c.files.clone()).unwrap_or_default();
        let sha = fake_sha(&self.site, &self.owner, &self.repo, index, message);
        self.commits.push(FakeCommit {
            sha,
            time: BASE_TIME + index as i64 * 60,
            files,
        });
        self
    }

    /// Adds or replaces a file in the latest commit.
    #[must_use]
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        if self.commits.is_empty() {
            self = self.with_commit("initial");
        }
        if let Some(commit) = self.commits.last_mut() {
            commit.files.insert(path.to_string(), content.to_string());
        }
        self
    }

    /// Writes `pawn.json` with the given dependency list into the latest commit.
    #[must_use]
    pub fn with_package(self, dependencies: &[&str]) -> Self {
        let definition = serde_json::json!({
            "user": self.owner,
            "repo": self.repo,
            "dependencies": dependencies,
        });
        let content = serde_json::to_string_pretty(&definition).unwrap_or_default();
        self.with_file("pawn.json", &content)
    }

    /// Tags the latest commit.
    #[must_use]
    pub fn with_tag(mut self, name: &str) -> Self {
        if self.commits.is_empty() {
            self = self.with_commit("initial");
        }
        self.tags.push((name.to_string(), self.commits.len() - 1));
        self
    }

    /// Creates a branch at the latest commit.
    #[must_use]
    pub fn with_branch(mut self, name: &str) -> Self {
        if self.commits.is_empty() {
            self = self.with_commit("initial");
        }
        self.branches.push((name.to_string(), self.commits.len() - 1));
        self
    }

    /// Clone URL, matching [`crate::dependency::GitDependency::url`].
    pub fn url(&self) -> String {
        format!("https://{}/{}/{}", self.site, self.owner, self.repo)
    }

    fn tip(&self) -> Option<usize> {
        self.commits.len().checked_sub(1)
    }

    fn branch_tip(&self, branch: Option<&str>) -> Result<usize> {
        match branch {
            None | Some(DEFAULT_BRANCH) => self.tip().ok_or_else(|| anyhow!("repository is empty")),
            Some(name) => self
                .branches
                .iter()
                .rev()
                .find(|(b, _)| b == name)
                .map(|(_, index)| *index)
                .ok_or_else(|| anyhow!("fatal: couldn't find remote ref {name}")),
        }
    }

    fn index_of(&self, sha: &str) -> Option<usize> {
        self.commits.iter().position(|c| c.sha == sha)
    }
}

fn fake_sha(site: &str, owner: &str, repo: &str, index: usize, message: &str) -> String {
    let digest = Sha256::digest(format!("{site}/{owner}/{repo}#{index}:{message}"));
    hex::encode(digest)[..40].to_string()
}

#[derive(Debug, Clone)]
struct FakeClone {
    remote: String,
    head: usize,
    corrupted: bool,
}

#[derive(Debug, Default)]
struct State {
    remotes: HashMap<String, FakeRepo>,
    clones: HashMap<PathBuf, FakeClone>,
    clone_count: usize,
    failing_pulls: usize,
}

/// Shared in-memory git backend; clones of the handle see the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeGit {
    state: Arc<Mutex<State>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Registers a remote, replacing any previous one with the same URL.
    pub fn add_repo(&self, repo: FakeRepo) {
        self.state().remotes.insert(repo.url(), repo);
    }

    /// Sha of the `index`th commit (oldest first) of a default-site remote.
    pub fn commit_of(&self, owner: &str, repo: &str, index: usize) -> String {
        let url = format!("https://{DEFAULT_SITE}/{owner}/{repo}");
        self.state()
            .remotes
            .get(&url)
            .and_then(|r| r.commits.get(index))
            .map(|c| c.sha.clone())
            .unwrap_or_default()
    }

    /// Number of successful clones so far.
    pub fn clone_count(&self) -> usize {
        self.state().clone_count
    }

    /// Makes the clone at `path` fail validation until it is removed.
    pub fn corrupt(&self, path: &Path) {
        if let Some(clone) = self.state().clones.get_mut(path) {
            clone.corrupted = true;
        }
        let _ = std::fs::remove_dir_all(path.join(".git").join("objects"));
    }

    /// The next `count` pulls fail.
    pub fn fail_pulls(&self, count: usize) {
        self.state().failing_pulls = count;
    }

    fn materialize(target: &Path, previous: Option<&FakeCommit>, commit: &FakeCommit) -> Result<()> {
        if let Some(previous) = previous {
            for stale in previous.files.keys().filter(|f| !commit.files.contains_key(*f)) {
                let _ = std::fs::remove_file(target.join(stale));
            }
        }
        for (relative, content) in &commit.files {
            let path = target.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content)?;
        }
        Ok(())
    }

    /// Moves the clone at `path` to commit `index` of its remote.
    fn move_head(&self, path: &Path, index: usize) -> Result<()> {
        let mut state = self.state();
        let clone = state
            .clones
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("not a git repository: {}", path.display()))?;
        let remote = state
            .remotes
            .get(&clone.remote)
            .ok_or_else(|| anyhow!("remote {} vanished", clone.remote))?;
        let previous = remote.commits.get(clone.head);
        let commit = remote
            .commits
            .get(index)
            .ok_or_else(|| anyhow!("commit index {index} out of range"))?;
        Self::materialize(path, previous, commit)?;
        if let Some(clone) = state.clones.get_mut(path) {
            clone.head = index;
        }
        Ok(())
    }

    fn remote_of(&self, path: &Path) -> Result<FakeRepo> {
        let state = self.state();
        let clone = state
            .clones
            .get(path)
            .ok_or_else(|| anyhow!("not a git repository: {}", path.display()))?;
        state
            .remotes
            .get(&clone.remote)
            .cloned()
            .ok_or_else(|| anyhow!("remote {} vanished", clone.remote))
    }
}

impl GitBackend for FakeGit {
    async fn clone_repo(
        &self,
        url: &str,
        target: &Path,
        branch: Option<&str>,
        _depth: Option<u32>,
    ) -> Result<()> {
        if target.exists() {
            bail!("destination path '{}' already exists", target.display());
        }

        let remote = {
            let state = self.state();
            let key = if state.remotes.contains_key(url) {
                Some(url.to_string())
            } else {
                state.clones.get(Path::new(url)).map(|clone| clone.remote.clone())
            };
            key.and_then(|key| state.remotes.get(&key).cloned())
        };
        let Some(remote) = remote else {
            return Err(PawnpmError::GitCloneFailed {
                url: url.to_string(),
                reason: "remote: Repository not found.".to_string(),
            }
            .into());
        };

        let head = remote.branch_tip(branch)?;
        std::fs::create_dir_all(target.join(".git").join("objects"))?;
        std::fs::create_dir_all(target.join(".git").join("refs"))?;
        Self::materialize(target, None, &remote.commits[head])?;

        let mut state = self.state();
        state.clones.insert(
            target.to_path_buf(),
            FakeClone {
                remote: remote.url(),
                head,
                corrupted: false,
            },
        );
        state.clone_count += 1;
        Ok(())
    }

    async fn pull(&self, path: &Path, branch: Option<&str>) -> Result<()> {
        {
            let mut state = self.state();
            if state.failing_pulls > 0 {
                state.failing_pulls -= 1;
                bail!("fatal: unable to access remote: Connection reset");
            }
        }
        let remote = self.remote_of(path)?;
        let index = remote.branch_tip(branch)?;
        self.move_head(path, index)
    }

    async fn checkout(&self, path: &Path, commit: &str) -> Result<()> {
        let remote = self.remote_of(path)?;
        let index = remote.index_of(commit).ok_or_else(|| PawnpmError::GitCheckoutFailed {
            reference: commit.to_string(),
            reason: format!("fatal: reference is not a tree: {commit}"),
        })?;
        self.move_head(path, index)
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
        match self.state().clones.get(path) {
            None => issues.push(RepoIssue::HeadUnresolvable),
            Some(clone) if clone.corrupted => issues.push(RepoIssue::HeadCommitMissing),
            Some(_) => {}
        }
        RepoDiagnosis { issues }
    }

    async fn repair(&self, path: &Path) -> Result<()> {
        let head = {
            let state = self.state();
            match state.clones.get(path) {
                Some(clone) if !clone.corrupted => clone.head,
                Some(_) => bail!("fatal: bad object HEAD"),
                None => bail!("not a git repository: {}", path.display()),
            }
        };
        self.move_head(path, head)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        self.state().clones.remove(path);
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    async fn list_tags(&self, path: &Path) -> Result<Vec<TagRef>> {
        let remote = self.remote_of(path)?;
        Ok(remote
            .tags
            .iter()
            .map(|(name, index)| TagRef {
                name: name.clone(),
                commit: remote.commits[*index].sha.clone(),
                time: remote.commits[*index].time,
            })
            .collect())
    }

    async fn list_branches(&self, path: &Path) -> Result<Vec<BranchRef>> {
        let remote = self.remote_of(path)?;
        let mut branches: Vec<BranchRef> = Vec::new();
        if let Some(tip) = remote.tip() {
            branches.push(BranchRef {
                name: DEFAULT_BRANCH.to_string(),
                commit: remote.commits[tip].sha.clone(),
            });
        }
        for (name, index) in &remote.branches {
            branches.retain(|b| &b.name != name);
            branches.push(BranchRef {
                name: name.clone(),
                commit: remote.commits[*index].sha.clone(),
            });
        }
        Ok(branches)
    }

    async fn list_commits(&self, path: &Path) -> Result<Vec<String>> {
        let remote = self.remote_of(path)?;
        Ok(remote.commits.iter().rev().map(|c| c.sha.clone()).collect())
    }

    async fn head_commit(&self, path: &Path) -> Result<String> {
        let head = self
            .state()
            .clones
            .get(path)
            .map(|clone| clone.head)
            .ok_or_else(|| anyhow!("not a git repository: {}", path.display()))?;
        let remote = self.remote_of(path)?;
        Ok(remote.commits[head].sha.clone())
    }
}
