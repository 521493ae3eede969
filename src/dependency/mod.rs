//! Dependency descriptors and the specifier grammar.
//!
//! A dependency is declared in a package definition as a free-form string. This module turns
//! those strings into a structured [`Dependency`] and renders descriptors back into their
//! canonical specifier form.
//!
//! # Specifier Grammar
//!
//! ```text
//! owner/repo                         latest commit on the default branch
//! owner/repo/sub/path                include files live in a sub directory
//! owner/repo:1.2.3                   tag or semver range (e.g. ":^1.2", ":1.x")
//! owner/repo@develop                 branch
//! owner/repo#<40 hex chars>          exact commit
//! gitlab.com/owner/repo              explicit hosting site
//! https://gitlab.com/owner/repo      full URL
//! git@github.com:owner/repo          SSH shorthand
//! plugin://local/plugins/streamer    workspace-local plugin
//! includes://owner/repo:2.0          remote URL-scheme dependency
//! ```
//!
//! Schemes are `plugin`, `includes`, `filterscript` and `component`. The override table is
//! consulted before any parsing happens, see [`crate::overrides`].
//!
//! # Examples
//!
//! ```rust
//! use pawnpm_cli::dependency::{Constraint, Dependency};
//!
//! let dep: Dependency = "user/repo:1.2.3".parse().unwrap();
//! let git = dep.git().unwrap();
//! assert_eq!(git.site, "github.com");
//! assert_eq!(git.constraint, Constraint::Tag("1.2.3".to_string()));
//! assert_eq!(dep.to_string(), "user/repo:1.2.3");
//! ```

mod parser;
pub mod scheme;

pub use parser::{parse_specifier, parse_with_overrides};
pub use scheme::UrlScheme;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::DEFAULT_SITE;
use crate::core::PawnpmError;

/// The version-selection rule attached to a git dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Constraint {
    /// Follow the tip of the default branch
    #[default]
    None,
    /// A tag name or semver range
    Tag(String),
    /// A branch name
    Branch(String),
    /// A full 40-character commit hash
    Commit(String),
}

impl Constraint {
    /// Constraint rendered the way it appears in a specifier: `:tag`, `@branch`, `#commit`
    /// or an empty string.
    #[must_use]
    pub fn as_suffix(&self) -> String {
        match self {
            Constraint::None => String::new(),
            Constraint::Tag(tag) => format!(":{tag}"),
            Constraint::Branch(branch) => format!("@{branch}"),
            Constraint::Commit(commit) => format!("#{commit}"),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Constraint::None)
    }

    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Constraint::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        match self {
            Constraint::Branch(branch) => Some(branch),
            _ => None,
        }
    }

    #[must_use]
    pub fn commit(&self) -> Option<&str> {
        match self {
            Constraint::Commit(commit) => Some(commit),
            _ => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_suffix())
    }
}

/// A dependency on a git repository hosted on some site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitDependency {
    /// Hosting site, `github.com` unless the specifier named another
    pub site: String,
    pub owner: String,
    pub repo: String,
    /// Sub directory inside the repository holding the include files
    pub path: Option<String>,
    pub constraint: Constraint,
    /// SSH user when the dependency was written as `user@host:owner/repo`
    pub ssh_user: Option<String>,
}

impl GitDependency {
    /// Unconstrained dependency on `owner/repo` on the default site.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            path: None,
            constraint: Constraint::None,
            ssh_user: None,
        }
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// `owner/repo`, the name used in log lines and error messages.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Clone URL. Does not check that the repository exists.
    #[must_use]
    pub fn url(&self) -> String {
        match &self.ssh_user {
            Some(user) => format!("{user}@{}:{}/{}", self.site, self.owner, self.repo),
            None => format!("https://{}/{}/{}", self.site, self.owner, self.repo),
        }
    }

    /// Location of this repository's cache entry.
    ///
    /// Pure function of owner, repo and branch; human readable so entries can be inspected
    /// and removed by hand.
    #[must_use]
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        let branch = self.constraint.branch().unwrap_or("default");
        cache_dir.join("packages").join(&self.owner).join(&self.repo).join(branch)
    }

    #[must_use]
    pub fn is_default_site(&self) -> bool {
        self.site == DEFAULT_SITE
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.owner.is_empty() {
            return Err("dependency is missing the repository owner");
        }
        if self.repo.is_empty() {
            return Err("dependency is missing the repository name");
        }
        Ok(())
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, with_site: bool) -> fmt::Result {
        if with_site {
            match &self.ssh_user {
                Some(user) => write!(f, "{user}@{}:", self.site)?,
                None if !self.is_default_site() => write!(f, "{}/", self.site)?,
                None => {}
            }
        }
        write!(f, "{}/{}", self.owner, self.repo)?;
        if let Some(path) = &self.path {
            write!(f, "/{}", path.trim_start_matches('/'))?;
        }
        write!(f, "{}", self.constraint)
    }
}

impl fmt::Display for GitDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, true)
    }
}

/// The parsed, structured form of a dependency specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Plain git repository dependency
    Git(GitDependency),
    /// Scheme dependency pointing inside the workspace (`scheme://local/<path>`)
    LocalScheme {
        scheme: UrlScheme,
        /// Path relative to the project directory
        path: String,
    },
    /// Scheme dependency backed by a git repository (`scheme://owner/repo`)
    RemoteScheme { scheme: UrlScheme, remote: GitDependency },
}

/// Shape of a dependency, used to pick a handler without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Git,
    LocalScheme(UrlScheme),
    RemoteScheme(UrlScheme),
}

impl Dependency {
    #[must_use]
    pub const fn kind(&self) -> DependencyKind {
        match self {
            Dependency::Git(_) => DependencyKind::Git,
            Dependency::LocalScheme { scheme, .. } => DependencyKind::LocalScheme(*scheme),
            Dependency::RemoteScheme { scheme, .. } => DependencyKind::RemoteScheme(*scheme),
        }
    }

    /// The backing git repository, if any.
    #[must_use]
    pub const fn git(&self) -> Option<&GitDependency> {
        match self {
            Dependency::Git(git) | Dependency::RemoteScheme { remote: git, .. } => Some(git),
            Dependency::LocalScheme { .. } => None,
        }
    }

    pub fn git_mut(&mut self) -> Option<&mut GitDependency> {
        match self {
            Dependency::Git(git) | Dependency::RemoteScheme { remote: git, .. } => Some(git),
            Dependency::LocalScheme { .. } => None,
        }
    }

    #[must_use]
    pub const fn scheme(&self) -> Option<UrlScheme> {
        match self {
            Dependency::Git(_) => None,
            Dependency::LocalScheme { scheme, .. } | Dependency::RemoteScheme { scheme, .. } => {
                Some(*scheme)
            }
        }
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Dependency::LocalScheme { .. })
    }

    /// The constraint of the backing repository; local scheme dependencies have none.
    #[must_use]
    pub fn constraint(&self) -> &Constraint {
        static NONE: Constraint = Constraint::None;
        self.git().map_or(&NONE, |git| &git.constraint)
    }

    /// Constraint string recorded in the lockfile (`:tag`, `@branch`, `#commit` or empty).
    #[must_use]
    pub fn constraint_string(&self) -> String {
        self.constraint().as_suffix()
    }

    /// Repository name, or the basename of the local path for local scheme dependencies.
    #[must_use]
    pub fn repo_name(&self) -> String {
        match self {
            Dependency::LocalScheme { path, .. } => Path::new(path)
                .file_name()
                .map_or_else(|| path.clone(), |name| name.to_string_lossy().into_owned()),
            Dependency::Git(git) | Dependency::RemoteScheme { remote: git, .. } => {
                git.repo.clone()
            }
        }
    }

    /// Checks the structural invariants of a parsed descriptor.
    pub fn validate(&self) -> Result<(), PawnpmError> {
        let result = match self {
            Dependency::Git(git) => git.validate(),
            Dependency::LocalScheme { path, .. } if path.is_empty() => {
                Err("local scheme dependency is missing its path")
            }
            Dependency::LocalScheme { .. } => Ok(()),
            Dependency::RemoteScheme { remote, .. } => remote.validate(),
        };
        result.map_err(|reason| PawnpmError::InvalidDependency {
            name: self.to_string(),
            reason: reason.to_string(),
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Git(git) => git.render(f, true),
            Dependency::LocalScheme { scheme, path } => write!(f, "{scheme}://local/{path}"),
            Dependency::RemoteScheme { scheme, remote } => {
                write!(f, "{scheme}://")?;
                remote.render(f, false)
            }
        }
    }
}

impl FromStr for Dependency {
    type Err = PawnpmError;

    /// Parses without consulting any override table.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_specifier(s)
    }
}

impl From<GitDependency> for Dependency {
    fn from(git: GitDependency) -> Self {
        Dependency::Git(git)
    }
}
