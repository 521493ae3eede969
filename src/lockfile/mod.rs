//! Lockfile management for reproducible dependency resolution.
//!
//! `pawn.lock` records, for every dependency the last successful `ensure` touched, the
//! constraint that was declared, the commit it resolved to and an integrity tag. The next
//! resolution replays those commits instead of re-resolving tags and branches, so two machines
//! with the same lockfile vendor identical trees.
//!
//! # Keys
//!
//! | Dependency | Key |
//! |------------|-----|
//! | git | `<site>/<owner>/<repo>` |
//! | remote scheme | `<scheme>://<owner>/<repo>` |
//! | local scheme | `<scheme>://local/<path>` |
//!
//! Keys follow the dependency *after* override rewriting. An entry recorded under a
//! pre-override identity is never consulted for the redirected one; it is pruned on the next
//! successful run.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "generated": "2026-01-01T12:00:00Z",
//!   "sampctl_version": "0.3.2",
//!   "dependencies": {
//!     "github.com/pawn-lang/samp-stdlib": {
//!       "constraint": ":0.3.7",
//!       "resolved": "v0.3.7",
//!       "commit": "7a13c662b4dfd7b8d9d2d0c3bd3b0e3ab5e9d5a4",
//!       "integrity": "commit:7a13c662b4dfd7b8d9d2d0c3bd3b0e3ab5e9d5a4",
//!       "site": "github.com",
//!       "user": "pawn-lang",
//!       "repo": "samp-stdlib"
//!     }
//!   }
//! }
//! ```
//!
//! The file is JSON or YAML following the package definition's format. Loading detects the
//! format from the content, see [`io`].

pub mod integrity;
pub mod io;
pub mod session;

pub use integrity::{commit_integrity, directory_integrity, is_valid_integrity, parse_integrity, verify_integrity};
pub use session::LockfileSession;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::DEFAULT_SITE;
use crate::core::PawnpmError;
use crate::dependency::{Constraint, Dependency};

/// Lockfile schema version written by this build.
pub const LOCKFILE_VERSION: u32 = 1;

/// Version stamped into `sampctl_version`.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The whole lockfile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    /// Schema version; zero means the field was missing
    #[serde(default)]
    pub version: u32,

    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    #[serde(rename = "sampctl_version", default)]
    pub tool_version: String,

    #[serde(default)]
    pub dependencies: BTreeMap<String, LockedDependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<LockedRuntime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<LockedBuild>,
}

/// One resolved dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    /// Declared constraint: `:tag`, `@branch`, `#commit` or empty
    #[serde(default)]
    pub constraint: String,

    /// Human readable version the commit corresponds to
    #[serde(default)]
    pub resolved: String,

    #[serde(default)]
    pub commit: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub integrity: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub site: String,

    #[serde(rename = "user", default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transitive: bool,

    /// Keys of the dependencies that pulled this one in; empty for direct dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_by: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheme: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local: String,
}

/// Server runtime that was provisioned for the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedRuntime {
    pub version: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<LockedFileInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedFileInfo {
    pub path: String,
    pub size: u64,
    pub hash: String,
    #[serde(default)]
    pub mode: u32,
}

/// Compiler and output of the last build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBuild {
    pub compiler_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compiler_preset: String,
    pub entry: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_hash: String,
}

/// Lockfile key of `dependency`, see the module documentation.
#[must_use]
pub fn dependency_key(dependency: &Dependency) -> String {
    match dependency {
        Dependency::Git(git) => {
            let site = if git.site.is_empty() { DEFAULT_SITE } else { &git.site };
            format!("{site}/{}/{}", git.owner, git.repo)
        }
        Dependency::RemoteScheme { scheme, remote } => {
            format!("{scheme}://{}/{}", remote.owner, remote.repo)
        }
        Dependency::LocalScheme { scheme, path } => format!("{scheme}://local/{path}"),
    }
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFile {
    /// An empty lockfile at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            generated: Utc::now(),
            tool_version: TOOL_VERSION.to_string(),
            dependencies: BTreeMap::new(),
            runtime: None,
            build: None,
        }
    }

    /// Checks the schema version. `file` only labels the error.
    pub fn validate(&self, file: &str) -> Result<(), PawnpmError> {
        if self.version == 0 {
            return Err(PawnpmError::LockfileVersionMissing {
                file: file.to_string(),
            });
        }
        if self.version > LOCKFILE_VERSION {
            return Err(PawnpmError::LockfileVersionUnsupported {
                file: file.to_string(),
                version: self.version,
                supported: LOCKFILE_VERSION,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, dependency: &Dependency) -> Option<&LockedDependency> {
        self.dependencies.get(&dependency_key(dependency))
    }

    pub fn insert(&mut self, key: impl Into<String>, locked: LockedDependency) {
        self.dependencies.insert(key.into(), locked);
    }

    pub fn remove(&mut self, key: &str) -> Option<LockedDependency> {
        self.dependencies.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// `dependency` pinned to its locked commit.
    ///
    /// `None` when there is no entry. An entry with a commit replaces any tag or branch
    /// constraint with that commit; an entry without one leaves the dependency unchanged.
    #[must_use]
    pub fn locked_ref_for(&self, dependency: &Dependency) -> Option<Dependency> {
        let locked = self.get(dependency)?;
        let mut pinned = dependency.clone();
        if !locked.commit.is_empty() {
            if let Some(git) = pinned.git_mut() {
                git.constraint = Constraint::Commit(locked.commit.clone());
            }
        }
        Some(pinned)
    }

    /// True when `dependency` has no entry or its declared constraint changed since locking.
    #[must_use]
    pub fn is_outdated(&self, dependency: &Dependency) -> bool {
        self.get(dependency)
            .is_none_or(|locked| locked.constraint != dependency.constraint_string())
    }

    pub fn direct_dependencies(&self) -> impl Iterator<Item = (&String, &LockedDependency)> {
        self.dependencies.iter().filter(|(_, dep)| !dep.transitive)
    }

    pub fn transitive_dependencies(&self) -> impl Iterator<Item = (&String, &LockedDependency)> {
        self.dependencies.iter().filter(|(_, dep)| dep.transitive)
    }

    pub fn touch(&mut self) {
        self.generated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::GitDependency;

    const COMMIT: &str = "abc123abc123abc123abc123abc123abc123abcd";

    fn locked(constraint: &str) -> LockedDependency {
        LockedDependency {
            constraint: constraint.to_string(),
            resolved: "1.2.0".to_string(),
            commit: COMMIT.to_string(),
            owner: "user".to_string(),
            repo: "repo".to_string(),
            ..LockedDependency::default()
        }
    }

    #[test]
    fn test_keys() {
        let git: Dependency = "user/repo:1.0".parse().unwrap();
        assert_eq!(dependency_key(&git), "github.com/user/repo");

        let gitlab: Dependency = "gitlab.com/user/repo".parse().unwrap();
        assert_eq!(dependency_key(&gitlab), "gitlab.com/user/repo");

        let remote: Dependency = "plugin://user/repo:2.0".parse().unwrap();
        assert_eq!(dependency_key(&remote), "plugin://user/repo");

        let local: Dependency = "includes://local/libs/util".parse().unwrap();
        assert_eq!(dependency_key(&local), "includes://local/libs/util");
    }

    #[test]
    fn test_locked_commit_replaces_tag() {
        let mut lock = LockFile::new();
        lock.insert("github.com/user/repo", locked(":1.x"));

        let declared = Dependency::Git(
            GitDependency::new("user", "repo").with_constraint(Constraint::Tag("1.x".to_string())),
        );
        let pinned = lock.locked_ref_for(&declared).unwrap();
        let git = pinned.git().unwrap();
        assert_eq!(git.constraint, Constraint::Commit(COMMIT.to_string()));
        assert!(git.constraint.tag().is_none());

        let branch: Dependency = "user/repo@develop".parse().unwrap();
        let pinned = lock.locked_ref_for(&branch).unwrap();
        assert_eq!(pinned.constraint().commit(), Some(COMMIT));

        let other: Dependency = "user/other".parse().unwrap();
        assert!(lock.locked_ref_for(&other).is_none());
    }

    #[test]
    fn test_is_outdated() {
        let mut lock = LockFile::new();
        lock.insert("github.com/user/repo", locked(":1.x"));

        assert!(!lock.is_outdated(&"user/repo:1.x".parse().unwrap()));
        assert!(lock.is_outdated(&"user/repo:2.x".parse().unwrap()));
        assert!(lock.is_outdated(&"user/repo".parse().unwrap()));
        assert!(lock.is_outdated(&"user/missing:1.x".parse().unwrap()));
    }

    #[test]
    fn test_validate_versions() {
        let mut lock = LockFile::new();
        assert!(lock.validate("pawn.lock").is_ok());

        lock.version = 0;
        assert!(matches!(
            lock.validate("pawn.lock"),
            Err(PawnpmError::LockfileVersionMissing { .. })
        ));

        lock.version = LOCKFILE_VERSION + 1;
        assert!(matches!(
            lock.validate("pawn.lock"),
            Err(PawnpmError::LockfileVersionUnsupported { version: 2, supported: 1, .. })
        ));
    }

    #[test]
    fn test_direct_and_transitive_views() {
        let mut lock = LockFile::new();
        lock.insert("github.com/user/repo", locked(""));
        let mut nested = locked("");
        nested.transitive = true;
        nested.required_by = vec!["github.com/user/repo".to_string()];
        lock.insert("github.com/user/nested", nested);

        assert_eq!(lock.direct_dependencies().count(), 1);
        let transitive: Vec<_> = lock.transitive_dependencies().map(|(k, _)| k.as_str()).collect();
        assert_eq!(transitive, vec!["github.com/user/nested"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut lock = LockFile::new();
        lock.insert("github.com/user/repo", locked(":1.x"));
        let json = serde_json::to_value(&lock).unwrap();
        assert!(json.get("sampctl_version").is_some());
        let entry = &json["dependencies"]["github.com/user/repo"];
        assert_eq!(entry["user"], "user");
        assert!(entry.get("transitive").is_none());
        assert!(entry.get("required_by").is_none());
    }
}
