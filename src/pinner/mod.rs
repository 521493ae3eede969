//! Pins unconstrained dependencies of the root package to their latest tag.
//!
//! A dependency declared as `owner/repo` follows whatever the default branch points at. The
//! pinner rewrites such declarations to `owner/repo:<tag>` so the next resolution is
//! reproducible even without a lockfile. Only the root package is touched; nested packages are
//! read-only from the project's point of view.
//!
//! The latest tag comes from the hosting site's release API when the dependency lives on the
//! default site, otherwise (or when there are no releases) from the tags of the cache entry, see
//! [`VersionResolver::latest`].
//!
//! After rewriting, the definition is saved and the graph is rebuilt so the cache holds the
//! pinned refs. If that rebuild fails, the definition file is restored byte for byte and the
//! call fails.

pub mod releases;

pub use releases::{GitHubReleases, Release, ReleasesApi, select_release};

use anyhow::{Context, Result, anyhow};
use std::fs::Permissions;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::dependency::{Constraint, GitDependency, parse_specifier};
use crate::git::GitBackend;
use crate::overrides::OverrideTable;
use crate::package::Package;
use crate::resolver::GraphBuilder;
use crate::utils::Platform;
use crate::utils::fs::atomic_write;
use crate::version::VersionResolver;

/// A dependency string that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedDependency {
    pub from: String,
    pub to: String,
}

/// Definition file contents captured before the pinner writes it.
struct Snapshot {
    path: PathBuf,
    bytes: Vec<u8>,
    permissions: Permissions,
}

impl Snapshot {
    fn take(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to snapshot {}", path.display()))?;
        let permissions = std::fs::metadata(path)
            .with_context(|| format!("Failed to snapshot {}", path.display()))?
            .permissions();
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            permissions,
        })
    }

    fn restore(&self) -> Result<()> {
        atomic_write(&self.path, &self.bytes)?;
        std::fs::set_permissions(&self.path, self.permissions.clone())
            .with_context(|| format!("Failed to restore permissions of {}", self.path.display()))
    }
}

pub struct TaglessPinner<'a, G: GitBackend, R: ReleasesApi> {
    cache: &'a CacheStore<G>,
    overrides: &'a OverrideTable,
    releases: &'a R,
    platform: Platform,
}

impl<'a, G: GitBackend, R: ReleasesApi> TaglessPinner<'a, G, R> {
    pub fn new(cache: &'a CacheStore<G>, overrides: &'a OverrideTable, releases: &'a R) -> Self {
        Self {
            cache,
            overrides,
            releases,
            platform: Platform::host(),
        }
    }

    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Pins every unconstrained runtime and development dependency of `root`.
    ///
    /// Returns the rewritten declarations; an empty list means the definition was left alone.
    /// `root` is updated in place and reverted together with the file when the refresh fails.
    pub async fn pin_unconstrained(&self, root: &mut Package) -> Result<Vec<PinnedDependency>> {
        let snapshot = Snapshot::take(&root.definition_path())?;
        let original = (root.dependencies.clone(), root.dev_dependencies.clone());

        let mut pinned = Vec::new();
        for list in [&mut root.dependencies, &mut root.dev_dependencies] {
            for raw in list.iter_mut() {
                if let Some(rewritten) = self.pin_one(raw).await {
                    info!("pinned {raw} to {rewritten}");
                    pinned.push(PinnedDependency {
                        from: std::mem::replace(raw, rewritten.clone()),
                        to: rewritten,
                    });
                }
            }
        }
        if pinned.is_empty() {
            debug!("{root}: no unconstrained dependencies to pin");
            return Ok(pinned);
        }

        root.write_definition()?;

        let refresh = GraphBuilder::new(self.cache, self.overrides, &root.local_path)
            .platform(self.platform)
            .build(root)
            .await;
        if let Err(e) = refresh {
            (root.dependencies, root.dev_dependencies) = original;
            let path = snapshot.path.display();
            return Err(match snapshot.restore() {
                Ok(()) => e.context(format!(
                    "Failed to refresh dependencies after pinning; changes to {path} were rolled back"
                )),
                Err(restore) => anyhow!(
                    "Failed to refresh dependencies after pinning ({e:#}) and failed to restore {path} ({restore:#})"
                ),
            });
        }
        Ok(pinned)
    }

    /// The pinned form of `raw`, or `None` when it stays as declared.
    async fn pin_one(&self, raw: &str) -> Option<String> {
        let mut dependency = match parse_specifier(raw) {
            Ok(dependency) => dependency,
            Err(e) => {
                warn!("Keeping invalid dependency '{raw}' unchanged: {e}");
                return None;
            }
        };
        let git = dependency.git_mut()?;
        if !git.constraint.is_none() || git.owner.is_empty() || git.repo.is_empty() {
            return None;
        }

        match self.latest_tag(git).await {
            Ok(Some(tag)) => {
                git.constraint = Constraint::Tag(tag);
                Some(dependency.to_string())
            }
            Ok(None) => {
                debug!("{raw}: no tags to pin to");
                None
            }
            Err(e) => {
                warn!("Could not determine the latest tag of {raw}: {e:#}");
                None
            }
        }
    }

    async fn latest_tag(&self, git: &GitDependency) -> Result<Option<String>> {
        if git.is_default_site() {
            match self.releases.list_releases(&git.owner, &git.repo).await {
                Ok(releases) => {
                    if let Some(tag) = select_release(&releases) {
                        return Ok(Some(tag.to_string()));
                    }
                }
                Err(e) => debug!("{git}: release lookup failed, using cached tags: {e:#}"),
            }
        }

        let path = if self.cache.is_cached(git) {
            self.cache.entry_path(git)
        } else {
            self.cache.ensure(git, false).await?
        };
        let resolver = VersionResolver::from_repo(self.cache.git(), &path).await?;
        Ok(resolver.latest().map(|tag| tag.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGit, FakeRepo};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct StaticReleases {
        releases: HashMap<String, Vec<Release>>,
        calls: AtomicUsize,
    }

    impl StaticReleases {
        fn with(mut self, name: &str, tags: &[&str]) -> Self {
            let releases = tags
                .iter()
                .map(|tag| Release {
                    tag_name: (*tag).to_string(),
                    ..Release::default()
                })
                .collect();
            self.releases.insert(name.to_string(), releases);
            self
        }
    }

    impl ReleasesApi for StaticReleases {
        async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.releases.get(&format!("{owner}/{repo}")).cloned().unwrap_or_default())
        }

        async fn release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Option<Release>> {
            let releases = self.list_releases(owner, repo).await?;
            Ok(releases.into_iter().find(|r| r.tag_name == tag))
        }
    }

    fn project(dependencies: &[&str], dev: &[&str]) -> (TempDir, Package) {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("project");
        std::fs::create_dir_all(&dir).unwrap();
        let body = serde_json::json!({
            "user": "me",
            "repo": "gamemode",
            "entry": "gamemodes/main.pwn",
            "dependencies": dependencies,
            "dev_dependencies": dev,
        });
        std::fs::write(dir.join("pawn.json"), serde_json::to_vec_pretty(&body).unwrap()).unwrap();
        let package = Package::load(&dir).unwrap();
        (temp, package)
    }

    #[tokio::test]
    async fn test_pins_to_highest_cached_tag() {
        let git = FakeGit::new();
        git.add_repo(
            FakeRepo::new("user", "repo")
                .with_commit("one")
                .with_tag("1.0.0")
                .with_commit("two")
                .with_tag("2.0.0"),
        );
        let (temp, mut root) = project(&["user/repo"], &[]);
        let store = CacheStore::new(git, temp.path().join("cache"));
        let overrides = OverrideTable::new();
        let releases = StaticReleases::default();

        let pinned = TaglessPinner::new(&store, &overrides, &releases)
            .pin_unconstrained(&mut root)
            .await
            .unwrap();

        assert_eq!(
            pinned,
            vec![PinnedDependency {
                from: "user/repo".to_string(),
                to: "user/repo:2.0.0".to_string(),
            }]
        );
        let reloaded = Package::load(&root.local_path).unwrap();
        assert_eq!(reloaded.dependencies, vec!["user/repo:2.0.0"]);
        assert_eq!(reloaded.entry.as_deref(), Some("gamemodes/main.pwn"));
    }

    #[tokio::test]
    async fn test_release_api_takes_precedence() {
        let git = FakeGit::new();
        git.add_repo(
            FakeRepo::new("user", "repo")
                .with_commit("one")
                .with_tag("v1.0.0")
                .with_commit("two")
                .with_tag("v1.1.0"),
        );
        git.add_repo(FakeRepo::new("user", "tool").with_commit("one").with_tag("0.1.0"));
        let (temp, mut root) = project(&["user/repo/include"], &["user/tool"]);
        let store = CacheStore::new(git, temp.path().join("cache"));
        let overrides = OverrideTable::new();
        let releases = StaticReleases::default().with("user/repo", &["v1.0.0"]);

        let pinned = TaglessPinner::new(&store, &overrides, &releases)
            .pin_unconstrained(&mut root)
            .await
            .unwrap();

        assert_eq!(pinned.len(), 2);
        assert_eq!(root.dependencies, vec!["user/repo/include:v1.0.0"]);
        assert_eq!(root.dev_dependencies, vec!["user/tool:0.1.0"]);
        assert_eq!(releases.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_constrained_local_and_invalid_are_kept() {
        let git = FakeGit::new();
        let (temp, mut root) = project(
            &["user/lib:1.0.0", "user/dev@develop", "plugin://local/plugins/x", "user/bad#abc123"],
            &[],
        );
        let before = std::fs::read(root.definition_path()).unwrap();
        let store = CacheStore::new(git, temp.path().join("cache"));
        let overrides = OverrideTable::new();
        let releases = StaticReleases::default();

        let pinned = TaglessPinner::new(&store, &overrides, &releases)
            .pin_unconstrained(&mut root)
            .await
            .unwrap();

        assert!(pinned.is_empty());
        assert_eq!(std::fs::read(root.definition_path()).unwrap(), before);
        assert_eq!(releases.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_rolls_back() {
        let git = FakeGit::new();
        git.add_repo(FakeRepo::new("user", "repo").with_commit("one").with_tag("1.0.0"));
        // The pinned tag does not exist, so the refresh cannot check it out
        let releases = StaticReleases::default().with("user/repo", &["9.9.9"]);
        let (temp, mut root) = project(&["user/repo"], &[]);
        let before = std::fs::read(root.definition_path()).unwrap();
        let store = CacheStore::new(git, temp.path().join("cache"));
        let overrides = OverrideTable::new();

        let err = TaglessPinner::new(&store, &overrides, &releases)
            .pin_unconstrained(&mut root)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("rolled back"));
        assert_eq!(std::fs::read(root.definition_path()).unwrap(), before);
        assert_eq!(root.dependencies, vec!["user/repo"]);
    }

    #[tokio::test]
    async fn test_release_by_tag_lookup() {
        let releases = StaticReleases::default().with("user/repo", &["v2", "v1"]);
        let found = releases.release_by_tag("user", "repo", "v1").await.unwrap();
        assert_eq!(found.map(|r| r.tag_name), Some("v1".to_string()));
        assert!(releases.release_by_tag("user", "repo", "v3").await.unwrap().is_none());
    }
}
