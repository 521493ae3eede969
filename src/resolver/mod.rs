//! Dependency graph construction.
//!
//! The [`GraphBuilder`] walks a root package's declared dependencies depth first and produces a
//! flattened [`DependencyGraph`]:
//!
//! - every dependency reached, each tagged with the lockfile key of the package that required it
//! - the subset that are plugin binaries
//! - extra include paths contributed by `includes://` dependencies and resource manifests
//!
//! # Walk rules
//!
//! - The root contributes its runtime and development dependencies; nested packages contribute
//!   runtime dependencies only.
//! - A visited set keyed by repository name, seeded with the root's own name, stops cycles and
//!   self references. The first declaration of a repository wins.
//! - Every specifier goes through the override table before parsing.
//! - Local scheme dependencies are recorded without touching the network. Git and remote scheme
//!   dependencies get a valid cache entry checked out at their constraint, and the walk continues
//!   into the package definition of that checkout, if it has one.
//!
//! # Failure policy
//!
//! A failure on one of the root package's own dependencies aborts the build. A failure deeper
//! in the walk is logged at warn level and that branch is skipped.
//!
//! The walk is strictly sequential: each dependency is completely handled before the next.

pub mod schemes;

use anyhow::{Context, Result, anyhow};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::constants::VENDOR_DIR;
use crate::dependency::{Dependency, parse_with_overrides};
use crate::git::GitBackend;
use crate::lockfile::dependency_key;
use crate::overrides::OverrideTable;
use crate::package::Package;
use crate::utils::Platform;
use schemes::Contribution;

/// One flattened dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntry {
    pub dependency: Dependency,
    /// Lockfile key of the requiring package; `None` for the root's own dependencies
    pub required_by: Option<String>,
}

impl GraphEntry {
    #[must_use]
    pub fn key(&self) -> String {
        dependency_key(&self.dependency)
    }

    #[must_use]
    pub const fn is_transitive(&self) -> bool {
        self.required_by.is_some()
    }
}

/// Result of one resolution pass. Rebuilt on every run, never persisted.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub dependencies: Vec<GraphEntry>,
    pub plugins: Vec<Dependency>,
    pub include_paths: Vec<PathBuf>,
}

impl DependencyGraph {
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Lockfile keys of every entry.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<String> {
        self.dependencies.iter().map(GraphEntry::key).collect()
    }

    #[must_use]
    pub fn find(&self, repo: &str) -> Option<&GraphEntry> {
        self.dependencies.iter().find(|e| e.dependency.repo_name() == repo)
    }

    fn add_plugin(&mut self, dependency: &Dependency) {
        if !self.plugins.contains(dependency) {
            self.plugins.push(dependency.clone());
        }
    }

    fn add_include_path(&mut self, path: PathBuf) {
        if !self.include_paths.contains(&path) {
            self.include_paths.push(path);
        }
    }

    fn apply(&mut self, dependency: &Dependency, contribution: Contribution) {
        match contribution {
            Contribution::Plugin => self.add_plugin(dependency),
            Contribution::IncludePath(path) => self.add_include_path(path),
            Contribution::Nothing => {}
        }
    }
}

/// Mutable state of one walk: the visited set and the graph being accumulated.
#[derive(Debug)]
pub struct ResolutionSession {
    visited: HashSet<String>,
    graph: DependencyGraph,
}

impl ResolutionSession {
    /// A session whose visited set already holds the root package's repository name.
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        Self {
            visited: HashSet::from([root_name.to_string()]),
            graph: DependencyGraph::default(),
        }
    }

    /// Marks `repo` visited; false when it already was.
    pub fn visit(&mut self, repo: &str) -> bool {
        self.visited.insert(repo.to_string())
    }

    #[must_use]
    pub fn is_visited(&self, repo: &str) -> bool {
        self.visited.contains(repo)
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    #[must_use]
    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }
}

/// Walks a package's dependency tree through the cache.
pub struct GraphBuilder<'a, G: GitBackend> {
    cache: &'a CacheStore<G>,
    overrides: &'a OverrideTable,
    project_dir: PathBuf,
    platform: Platform,
    force_update: bool,
}

impl<'a, G: GitBackend> GraphBuilder<'a, G> {
    pub fn new(cache: &'a CacheStore<G>, overrides: &'a OverrideTable, project_dir: &Path) -> Self {
        Self {
            cache,
            overrides,
            project_dir: project_dir.to_path_buf(),
            platform: Platform::host(),
            force_update: false,
        }
    }

    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Pull existing cache entries before reading them.
    #[must_use]
    pub fn force_update(mut self, force_update: bool) -> Self {
        self.force_update = force_update;
        self
    }

    /// Builds the graph of `root`.
    pub async fn build(&self, root: &Package) -> Result<DependencyGraph> {
        let mut session = ResolutionSession::new(&root.repo_name());
        for raw in root.all_dependencies() {
            self.visit(&mut session, &raw, None)
                .await
                .with_context(|| format!("Failed to ensure dependency '{raw}' of {root}"))?;
        }
        let graph = session.into_graph();
        debug!(
            "dependency graph of {root}: {} dependencies, {} plugins, {} include paths",
            graph.dependencies.len(),
            graph.plugins.len(),
            graph.include_paths.len()
        );
        Ok(graph)
    }

    /// Handles one declared dependency string.
    async fn visit(
        &self,
        session: &mut ResolutionSession,
        raw: &str,
        required_by: Option<&str>,
    ) -> Result<()> {
        let dependency = parse_with_overrides(raw, self.overrides)?;

        if dependency.is_local() {
            return self.visit_local(session, dependency, required_by);
        }
        let Some(git) = dependency.git() else {
            return Ok(());
        };

        let name = dependency.repo_name();
        if !session.visit(&name) {
            debug!("{dependency}: already visited, skipping");
            return Ok(());
        }

        let path = self.cache.ensure(git, self.force_update).await?;
        self.cache
            .checkout(&path, git)
            .await
            .with_context(|| format!("Failed to check out {dependency}"))?;

        if let Some(scheme) = dependency.scheme() {
            let handler =
                schemes::handler(scheme).ok_or_else(|| anyhow!("no handler for scheme {scheme}"))?;
            let contribution = (handler.remote)(&self.project_dir, git);
            session.graph.apply(&dependency, contribution);
        }

        let key = dependency_key(&dependency);
        session.graph.dependencies.push(GraphEntry {
            dependency: dependency.clone(),
            required_by: required_by.map(str::to_string),
        });

        let Some(package) = Package::from_dir(&path)? else {
            debug!("{dependency}: no package definition, not descending");
            return Ok(());
        };
        self.collect_resources(session, &dependency, &package);

        for nested in &package.dependencies {
            let result = Box::pin(self.visit(session, nested, Some(&key))).await;
            if let Err(e) = result {
                warn!("Skipping dependency '{nested}' of {dependency}: {e:#}");
            }
        }
        Ok(())
    }

    fn visit_local(
        &self,
        session: &mut ResolutionSession,
        dependency: Dependency,
        required_by: Option<&str>,
    ) -> Result<()> {
        let Dependency::LocalScheme { scheme, path } = &dependency else {
            return Ok(());
        };
        let handler =
            schemes::handler(*scheme).ok_or_else(|| anyhow!("no handler for scheme {scheme}"))?;
        let contribution = (handler.local)(&self.project_dir, path)
            .with_context(|| format!("Failed to handle {dependency}"))?;
        session.graph.apply(&dependency, contribution);

        debug!("{dependency}: recorded local dependency");
        session.graph.dependencies.push(GraphEntry {
            dependency,
            required_by: required_by.map(str::to_string),
        });
        Ok(())
    }

    /// Include paths and plugin detection from the resources declared for this platform.
    fn collect_resources(&self, session: &mut ResolutionSession, dependency: &Dependency, package: &Package) {
        let repo = dependency.repo_name();
        for resource in package.resources.iter().filter(|r| r.matches_platform(self.platform)) {
            if let Err(reason) = resource.validate() {
                warn!("{dependency}: ignoring resource: {reason}");
                continue;
            }
            if !resource.includes.is_empty() {
                let include = self.project_dir.join(VENDOR_DIR).join(resource.path(&repo));
                session.graph.add_include_path(include);
            }
            if resource.is_plugin(self.platform) {
                debug!("{dependency}: resource {} is a plugin", resource.name);
                session.graph.add_plugin(dependency);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGit, FakeRepo};
    use tempfile::tempdir;

    struct Fixture {
        _temp: tempfile::TempDir,
        project: PathBuf,
        store: CacheStore<FakeGit>,
    }

    fn fixture(git: FakeGit) -> Fixture {
        let temp = tempdir().unwrap();
        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        let store = CacheStore::new(git, temp.path().join("cache"));
        Fixture {
            _temp: temp,
            project,
            store,
        }
    }

    fn root(project: &Path, dependencies: &[&str], dev: &[&str]) -> Package {
        Package {
            user: "me".to_string(),
            repo: "gamemode".to_string(),
            dependencies: dependencies.iter().map(ToString::to_string).collect(),
            dev_dependencies: dev.iter().map(ToString::to_string).collect(),
            local_path: project.to_path_buf(),
            ..Package::default()
        }
    }

    fn names(graph: &DependencyGraph) -> Vec<String> {
        graph.dependencies.iter().map(|e| e.dependency.repo_name()).collect()
    }

    #[tokio::test]
    async fn test_transitive_walk_and_dev_dependencies() {
        let git = FakeGit::new();
        git.add_repo(FakeRepo::new("user", "a").with_package(&["user/b"]));
        git.add_repo(FakeRepo::new("user", "b").with_commit("b"));
        git.add_repo(FakeRepo::new("user", "dev").with_package(&["user/devdep"]));
        git.add_repo(FakeRepo::new("user", "devdep").with_commit("x"));
        let f = fixture(git);
        let overrides = OverrideTable::new();

        let package = root(&f.project, &["user/a"], &["user/dev"]);
        let graph = GraphBuilder::new(&f.store, &overrides, &f.project).build(&package).await.unwrap();

        assert_eq!(names(&graph), vec!["a", "b", "dev", "devdep"]);
        assert!(graph.find("a").unwrap().required_by.is_none());
        assert_eq!(graph.find("b").unwrap().required_by.as_deref(), Some("github.com/user/a"));
        assert_eq!(graph.find("devdep").unwrap().required_by.as_deref(), Some("github.com/user/dev"));
    }

    #[tokio::test]
    async fn test_cycles_terminate_without_duplicates() {
        let git = FakeGit::new();
        git.add_repo(FakeRepo::new("user", "a").with_package(&["user/b"]));
        git.add_repo(FakeRepo::new("user", "b").with_package(&["user/a", "me/gamemode"]));
        let f = fixture(git);
        let overrides = OverrideTable::new();

        let package = root(&f.project, &["user/a", "user/b"], &[]);
        let graph = GraphBuilder::new(&f.store, &overrides, &f.project).build(&package).await.unwrap();
        assert_eq!(names(&graph), vec!["a", "b"]);
        assert_eq!(f.store.git().clone_count(), 2);
    }

    #[tokio::test]
    async fn test_nested_failure_is_skipped_root_failure_is_fatal() {
        let git = FakeGit::new();
        git.add_repo(FakeRepo::new("user", "a").with_package(&["ghost/missing", "user/b"]));
        git.add_repo(FakeRepo::new("user", "b").with_commit("b"));
        let f = fixture(git);
        let overrides = OverrideTable::new();
        let builder = GraphBuilder::new(&f.store, &overrides, &f.project);

        let graph = builder.build(&root(&f.project, &["user/a"], &[])).await.unwrap();
        assert_eq!(names(&graph), vec!["a", "b"]);

        let err = builder.build(&root(&f.project, &["ghost/missing"], &[])).await.unwrap_err();
        assert!(format!("{err:#}").contains("dependency 'ghost/missing'"));

        let err = builder.build(&root(&f.project, &["user/a#abc"], &[])).await.unwrap_err();
        assert!(format!("{err:#}").contains("incorrect length"));
    }

    #[tokio::test]
    async fn test_overrides_apply_before_parsing() {
        let git = FakeGit::new();
        git.add_repo(FakeRepo::new("new", "pkg").with_commit("one").with_tag("4.22"));
        let f = fixture(git);
        let mut overrides = OverrideTable::new();
        overrides.insert("old/pkg", "new/pkg:4.22");

        let graph = GraphBuilder::new(&f.store, &overrides, &f.project)
            .build(&root(&f.project, &["old/pkg:4.20"], &[]))
            .await
            .unwrap();
        assert_eq!(graph.dependencies[0].dependency.to_string(), "new/pkg:4.22");
    }

    #[tokio::test]
    async fn test_schemes_and_resources() {
        let git = FakeGit::new();
        git.add_repo(FakeRepo::new("user", "streamer").with_commit("bin"));
        git.add_repo(FakeRepo::new("user", "util").with_commit("inc"));
        git.add_repo(FakeRepo::new("user", "native").with_file(
            "pawn.json",
            r#"{"user": "user", "repo": "native", "resources": [
                {"name": "native.so", "platform": "linux"},
                {"name": "^native-(.*)\\.zip$", "platform": "windows", "archive": true,
                 "includes": ["include"], "plugins": ["native.dll"]}
            ]}"#,
        ));
        let f = fixture(git);
        std::fs::create_dir_all(f.project.join("libs/local")).unwrap();
        let overrides = OverrideTable::new();

        let package = root(
            &f.project,
            &[
                "plugin://local/plugins/custom",
                "includes://local/libs/local",
                "plugin://user/streamer",
                "includes://user/util/include",
                "user/native",
            ],
            &[],
        );

        let linux = GraphBuilder::new(&f.store, &overrides, &f.project)
            .platform(Platform::Linux)
            .build(&package)
            .await
            .unwrap();
        assert_eq!(linux.len(), 5);
        let plugins: Vec<String> = linux.plugins.iter().map(Dependency::repo_name).collect();
        assert_eq!(plugins, vec!["custom", "streamer", "native"]);
        assert_eq!(
            linux.include_paths,
            vec![f.project.join("libs/local"), f.project.join("dependencies/util/include")]
        );

        let windows = GraphBuilder::new(&f.store, &overrides, &f.project)
            .platform(Platform::Windows)
            .build(&package)
            .await
            .unwrap();
        assert_eq!(windows.include_paths.len(), 3);
        assert!(windows.include_paths[2].starts_with(f.project.join("dependencies/.resources")));
        assert!(windows.plugins.iter().any(|p| p.repo_name() == "native"));
    }
}
