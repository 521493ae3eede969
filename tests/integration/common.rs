//! Shared fixtures for the integration tests.

use anyhow::Result;
use pawnpm_cli::cache::CacheStore;
use pawnpm_cli::package::Package;
use pawnpm_cli::pinner::{Release, ReleasesApi};
use pawnpm_cli::test_utils::FakeGit;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch project next to a scratch cache, both inside one temporary directory.
pub struct TestProject {
    _temp: TempDir,
    pub dir: PathBuf,
    pub store: CacheStore<FakeGit>,
}

impl TestProject {
    pub fn new(git: FakeGit) -> Self {
        pawnpm_cli::test_utils::init_test_logging(None);
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("project");
        std::fs::create_dir_all(&dir).unwrap();
        let store = CacheStore::new(git, temp.path().join("cache"));
        Self {
            _temp: temp,
            dir,
            store,
        }
    }

    pub fn git(&self) -> &FakeGit {
        self.store.git()
    }

    /// Writes `pawn.json` and loads it back.
    pub fn write_package(&self, dependencies: &[&str], dev_dependencies: &[&str]) -> Package {
        write_package(&self.dir, dependencies, dev_dependencies)
    }

    pub fn vendored(&self, repo: &str) -> PathBuf {
        self.dir.join("dependencies").join(repo)
    }
}

pub fn write_package(dir: &Path, dependencies: &[&str], dev_dependencies: &[&str]) -> Package {
    let body = serde_json::json!({
        "user": "me",
        "repo": "gamemode",
        "entry": "gamemodes/main.pwn",
        "output": "gamemodes/main.amx",
        "dependencies": dependencies,
        "dev_dependencies": dev_dependencies,
    });
    std::fs::write(dir.join("pawn.json"), serde_json::to_vec_pretty(&body).unwrap()).unwrap();
    Package::load(dir).unwrap()
}

/// A hosting site without any releases, so pinning always falls back to cached tags.
pub struct NoReleases;

impl ReleasesApi for NoReleases {
    async fn list_releases(&self, _owner: &str, _repo: &str) -> Result<Vec<Release>> {
        Ok(Vec::new())
    }

    async fn release_by_tag(&self, _owner: &str, _repo: &str, _tag: &str) -> Result<Option<Release>> {
        Ok(None)
    }
}
