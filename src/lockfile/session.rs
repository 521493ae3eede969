//! Lockfile state for one resolution run.
//!
//! The session is loaded once before the walk, answers "which commit is locked for this
//! dependency", records every successful checkout, and writes the file at most once at the
//! end, and only when something actually changed. Recording happens after a checkout
//! succeeded, so a failed resolution never leaves a partial entry behind.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    LockFile, LockedBuild, LockedDependency, LockedRuntime, commit_integrity, dependency_key,
};
use crate::dependency::{Constraint, Dependency};
use crate::package::DefinitionFormat;

/// Lockfile-aware bookkeeping around a single `ensure` run.
#[derive(Debug)]
pub struct LockfileSession {
    dir: PathBuf,
    format: DefinitionFormat,
    lockfile: Option<LockFile>,
    dirty: bool,
}

impl LockfileSession {
    /// Opens the lockfile of the project in `dir`.
    ///
    /// With `enabled == false` the session is inert: nothing is pinned, recorded or saved.
    /// A project without a lockfile starts an empty one that counts as a change.
    pub fn open(dir: &Path, format: DefinitionFormat, enabled: bool) -> Result<Self> {
        let mut session = Self::disabled(dir, format);
        if !enabled {
            return Ok(session);
        }
        match LockFile::load(dir)? {
            Some(lockfile) => {
                info!("using lockfile with {} locked dependencies", lockfile.len());
                session.lockfile = Some(lockfile);
            }
            None => {
                debug!("no lockfile found, will create a new one");
                session.lockfile = Some(LockFile::new());
                session.dirty = true;
            }
        }
        Ok(session)
    }

    /// A session wrapping an in-memory lockfile.
    #[must_use]
    pub fn with_lockfile(dir: &Path, format: DefinitionFormat, lockfile: LockFile) -> Self {
        Self {
            lockfile: Some(lockfile),
            ..Self::disabled(dir, format)
        }
    }

    fn disabled(dir: &Path, format: DefinitionFormat) -> Self {
        Self {
            dir: dir.to_path_buf(),
            format,
            lockfile: None,
            dirty: false,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lockfile.is_some()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn lockfile(&self) -> Option<&LockFile> {
        self.lockfile.as_ref()
    }

    /// `dependency` pinned to its locked commit, or unchanged when nothing is locked.
    #[must_use]
    pub fn locked_dependency(&self, dependency: &Dependency) -> Dependency {
        let Some(pinned) = self.lockfile.as_ref().and_then(|lock| lock.locked_ref_for(dependency))
        else {
            return dependency.clone();
        };
        if let Some(commit) = pinned.constraint().commit() {
            debug!("{dependency}: using locked commit {}", short(commit));
        }
        pinned
    }

    /// True when the declared constraint of `dependency` no longer matches the lock.
    #[must_use]
    pub fn is_outdated(&self, dependency: &Dependency) -> bool {
        self.lockfile.as_ref().is_none_or(|lock| lock.is_outdated(dependency))
    }

    /// Records that `dependency` (as declared) was checked out at `commit`.
    ///
    /// `head_tag` is a tag pointing at the checked out commit, if any. When the entry already
    /// holds `commit` only transitivity, the requirer list and a changed constraint are
    /// updated. A direct entry never keeps requirers.
    pub fn record_resolution(
        &mut self,
        dependency: &Dependency,
        commit: &str,
        head_tag: Option<&str>,
        transitive: bool,
        required_by: Option<&str>,
    ) {
        let Some(lockfile) = self.lockfile.as_mut() else {
            return;
        };
        let Some(git) = dependency.git() else {
            return;
        };

        let key = dependency_key(dependency);
        let constraint = dependency.constraint_string();
        let requirer = required_by.filter(|r| transitive && !r.is_empty());

        if let Some(existing) = lockfile.dependencies.get_mut(&key) {
            if existing.commit == commit {
                if existing.transitive != transitive {
                    existing.transitive = transitive;
                    self.dirty = true;
                }
                if !transitive && !existing.required_by.is_empty() {
                    existing.required_by.clear();
                    self.dirty = true;
                }
                if let Some(requirer) = requirer {
                    if !existing.required_by.iter().any(|r| r == requirer) {
                        existing.required_by.push(requirer.to_string());
                        self.dirty = true;
                    }
                }
                if existing.constraint != constraint {
                    existing.constraint = constraint;
                    existing.resolved = resolved_version(&git.constraint, commit, head_tag);
                    self.dirty = true;
                }
                return;
            }
        }

        let locked = LockedDependency {
            constraint,
            resolved: resolved_version(&git.constraint, commit, head_tag),
            commit: commit.to_string(),
            integrity: commit_integrity(commit),
            site: git.site.clone(),
            owner: git.owner.clone(),
            repo: git.repo.clone(),
            path: git.path.clone().unwrap_or_default(),
            branch: git.constraint.branch().unwrap_or_default().to_string(),
            transitive,
            required_by: requirer.map(|r| vec![r.to_string()]).unwrap_or_default(),
            scheme: dependency.scheme().map(|s| s.to_string()).unwrap_or_default(),
            local: String::new(),
        };
        lockfile.insert(key.clone(), locked);
        self.dirty = true;
        debug!("locked {key} at commit {}", short(commit));
    }

    /// Records a workspace-local scheme dependency, optionally with a content hash.
    pub fn record_local_dependency(&mut self, dependency: &Dependency, integrity: Option<String>) {
        let Some(lockfile) = self.lockfile.as_mut() else {
            return;
        };
        let Dependency::LocalScheme { scheme, path } = dependency else {
            return;
        };

        let key = dependency_key(dependency);
        let locked = LockedDependency {
            integrity: integrity.unwrap_or_default(),
            owner: "local".to_string(),
            repo: dependency.repo_name(),
            scheme: scheme.to_string(),
            local: path.clone(),
            ..LockedDependency::default()
        };
        if lockfile.dependencies.get(&key) == Some(&locked) {
            return;
        }
        lockfile.insert(key.clone(), locked);
        self.dirty = true;
        debug!("recorded local dependency {key}");
    }

    pub fn record_runtime(&mut self, runtime: LockedRuntime) {
        if let Some(lockfile) = self.lockfile.as_mut() {
            if lockfile.runtime.as_ref() != Some(&runtime) {
                lockfile.runtime = Some(runtime);
                self.dirty = true;
            }
        }
    }

    pub fn record_build(&mut self, build: LockedBuild) {
        if let Some(lockfile) = self.lockfile.as_mut() {
            if lockfile.build.as_ref() != Some(&build) {
                lockfile.build = Some(build);
                self.dirty = true;
            }
        }
    }

    /// Drops every locked entry so the run resolves from scratch.
    pub fn force_update(&mut self) {
        if let Some(lockfile) = self.lockfile.as_mut() {
            *lockfile = LockFile::new();
            self.dirty = true;
            info!("lockfile cleared for fresh resolution");
        }
    }

    /// Removes entries whose key is not in `current`. Returns the removed keys.
    pub fn prune_missing(&mut self, current: &BTreeSet<String>) -> Vec<String> {
        let Some(lockfile) = self.lockfile.as_mut() else {
            return Vec::new();
        };
        let stale: Vec<String> =
            lockfile.dependencies.keys().filter(|key| !current.contains(*key)).cloned().collect();
        for key in &stale {
            lockfile.remove(key);
            debug!("pruned stale lock entry {key}");
        }
        if !stale.is_empty() {
            self.dirty = true;
        }
        stale
    }

    /// Writes the lockfile when the session changed it. Returns whether a write happened.
    pub fn save(&mut self) -> Result<bool> {
        let Some(lockfile) = self.lockfile.as_mut() else {
            return Ok(false);
        };
        if !self.dirty {
            debug!("lockfile unchanged, skipping save");
            return Ok(false);
        }
        lockfile.save(&self.dir, self.format)?;
        self.dirty = false;
        Ok(true)
    }

    pub fn direct_dependencies(&self) -> Vec<(&String, &LockedDependency)> {
        self.lockfile.iter().flat_map(LockFile::direct_dependencies).collect()
    }

    pub fn transitive_dependencies(&self) -> Vec<(&String, &LockedDependency)> {
        self.lockfile.iter().flat_map(LockFile::transitive_dependencies).collect()
    }
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

/// Human readable version: the tag at HEAD, else the constraint itself, else a short commit.
fn resolved_version(constraint: &Constraint, commit: &str, head_tag: Option<&str>) -> String {
    if let Some(tag) = head_tag {
        return tag.to_string();
    }
    match constraint {
        Constraint::Tag(tag) => tag.clone(),
        Constraint::Branch(branch) => branch.clone(),
        Constraint::Commit(_) => short(commit).to_string(),
        Constraint::None => "HEAD".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const C1: &str = "1111111111111111111111111111111111111111";
    const C2: &str = "2222222222222222222222222222222222222222";

    fn dep(spec: &str) -> Dependency {
        spec.parse().unwrap()
    }

    #[test]
    fn test_new_lockfile_is_dirty_and_saved_once() {
        let temp = tempdir().unwrap();
        let mut session = LockfileSession::open(temp.path(), DefinitionFormat::Json, true).unwrap();
        assert!(session.is_dirty());
        assert!(session.save().unwrap());
        assert!(!session.save().unwrap());

        let mut reopened =
            LockfileSession::open(temp.path(), DefinitionFormat::Json, true).unwrap();
        assert!(!reopened.is_dirty());
        assert!(!reopened.save().unwrap());
    }

    #[test]
    fn test_disabled_session_is_inert() {
        let temp = tempdir().unwrap();
        let mut session =
            LockfileSession::open(temp.path(), DefinitionFormat::Json, false).unwrap();
        session.record_resolution(&dep("user/repo"), C1, None, false, None);
        assert!(!session.is_enabled());
        assert!(!session.save().unwrap());
        assert!(!LockFile::exists(temp.path()));
        assert_eq!(session.locked_dependency(&dep("user/repo:1.0")), dep("user/repo:1.0"));
    }

    #[test]
    fn test_record_and_replay() {
        let temp = tempdir().unwrap();
        let mut session =
            LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, LockFile::new());

        let declared = dep("user/repo:1.x");
        assert!(session.is_outdated(&declared));
        session.record_resolution(&declared, C1, Some("v1.4.0"), false, None);
        assert!(!session.is_outdated(&declared));

        let entry = &session.lockfile().unwrap().dependencies["github.com/user/repo"];
        assert_eq!(entry.constraint, ":1.x");
        assert_eq!(entry.resolved, "v1.4.0");
        assert_eq!(entry.integrity, format!("commit:{C1}"));
        assert!(entry.required_by.is_empty());

        let pinned = session.locked_dependency(&declared);
        assert_eq!(pinned.constraint(), &Constraint::Commit(C1.to_string()));

        // Changing the declaration makes it outdated until it is re-locked
        let bumped = dep("user/repo:2.x");
        assert!(session.is_outdated(&bumped));
        session.record_resolution(&bumped, C2, None, false, None);
        assert!(!session.is_outdated(&bumped));
        assert_eq!(session.lockfile().unwrap().dependencies["github.com/user/repo"].resolved, "2.x");
    }

    #[test]
    fn test_transitive_requirers_are_deduplicated() {
        let temp = tempdir().unwrap();
        let mut session =
            LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, LockFile::new());
        let nested = dep("user/nested");

        session.record_resolution(&nested, C1, None, true, Some("github.com/user/a"));
        session.record_resolution(&nested, C1, None, true, Some("github.com/user/b"));
        session.record_resolution(&nested, C1, None, true, Some("github.com/user/a"));

        let entry = &session.lockfile().unwrap().dependencies["github.com/user/nested"];
        assert!(entry.transitive);
        assert_eq!(entry.required_by, vec!["github.com/user/a", "github.com/user/b"]);
        assert_eq!(entry.resolved, "HEAD");

        // Direct entries never carry requirers
        session.record_resolution(&dep("user/direct"), C2, None, false, Some("ignored"));
        assert!(session.lockfile().unwrap().dependencies["github.com/user/direct"].required_by.is_empty());
    }

    #[test]
    fn test_promotion_to_direct_clears_requirers() {
        let temp = tempdir().unwrap();
        let mut session =
            LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, LockFile::new());
        let lib = dep("user/lib");

        session.record_resolution(&lib, C1, None, true, Some("github.com/user/parent"));
        session.save().unwrap();
        assert!(!session.is_dirty());

        session.record_resolution(&lib, C1, None, false, None);
        assert!(session.is_dirty());
        let entry = &session.lockfile().unwrap().dependencies["github.com/user/lib"];
        assert!(!entry.transitive);
        assert!(entry.required_by.is_empty());
        assert_eq!(session.direct_dependencies().len(), 1);
        assert!(session.transitive_dependencies().is_empty());

        // And back: a direct entry that becomes transitive picks up its requirer
        session.record_resolution(&lib, C1, None, true, Some("github.com/user/other"));
        let entry = &session.lockfile().unwrap().dependencies["github.com/user/lib"];
        assert!(entry.transitive);
        assert_eq!(entry.required_by, vec!["github.com/user/other"]);
    }

    #[test]
    fn test_unchanged_resolution_keeps_session_clean() {
        let temp = tempdir().unwrap();
        let mut lock = LockFile::new();
        let mut session =
            LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, lock.clone());
        session.record_resolution(&dep("user/repo@main"), C1, None, false, None);
        lock = session.lockfile().unwrap().clone();

        let mut replay = LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, lock);
        replay.record_resolution(&dep("user/repo@main"), C1, None, false, None);
        assert!(!replay.is_dirty());
        assert_eq!(replay.lockfile().unwrap().dependencies["github.com/user/repo"].branch, "main");
    }

    #[test]
    fn test_local_dependencies_prune_and_force_update() {
        let temp = tempdir().unwrap();
        let mut session =
            LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Yaml, LockFile::new());

        let local = dep("plugin://local/plugins/streamer");
        session.record_local_dependency(&local, None);
        let entry = &session.lockfile().unwrap().dependencies["plugin://local/plugins/streamer"];
        assert_eq!(entry.owner, "local");
        assert_eq!(entry.repo, "streamer");
        assert_eq!(entry.scheme, "plugin");

        session.record_resolution(&dep("user/repo"), C1, None, false, None);
        let current: BTreeSet<String> = ["github.com/user/repo".to_string()].into();
        assert_eq!(session.prune_missing(&current), vec!["plugin://local/plugins/streamer"]);
        assert_eq!(session.direct_dependencies().len(), 1);

        assert!(session.save().unwrap());
        let content = std::fs::read_to_string(LockFile::path(temp.path())).unwrap();
        assert!(!content.starts_with('{'));

        session.force_update();
        assert!(session.lockfile().unwrap().is_empty());
        assert!(session.is_dirty());
    }

    #[test]
    fn test_runtime_and_build_are_recorded_once() {
        let temp = tempdir().unwrap();
        let mut lock = LockFile::new();
        lock.runtime = Some(LockedRuntime {
            version: "0.3.7".to_string(),
            platform: "linux".to_string(),
            ..LockedRuntime::default()
        });
        let mut session = LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, lock);

        session.record_runtime(LockedRuntime {
            version: "0.3.7".to_string(),
            platform: "linux".to_string(),
            ..LockedRuntime::default()
        });
        assert!(!session.is_dirty());

        let build = LockedBuild {
            compiler_version: "3.10.10".to_string(),
            entry: "gamemodes/main.pwn".to_string(),
            output: "gamemodes/main.amx".to_string(),
            ..LockedBuild::default()
        };
        session.record_build(build.clone());
        assert!(session.is_dirty());
        assert_eq!(session.lockfile().unwrap().build.as_ref(), Some(&build));
    }

    #[test]
    fn test_remote_scheme_entry() {
        let temp = tempdir().unwrap();
        let mut session =
            LockfileSession::with_lockfile(temp.path(), DefinitionFormat::Json, LockFile::new());
        session.record_resolution(&dep("plugin://user/streamer:2.9"), C1, None, false, None);
        let entry = &session.lockfile().unwrap().dependencies["plugin://user/streamer"];
        assert_eq!(entry.scheme, "plugin");
        assert_eq!(entry.constraint, ":2.9");
        assert_eq!(entry.resolved, "2.9");
    }
}
