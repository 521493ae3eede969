//! Version constraint resolution against a repository's refs.
//!
//! A [`Constraint`] is turned into a concrete commit by scanning the refs of a cached clone:
//!
//! - **Tag**: if the constraint is a semantic version or requirement (`1.2.3`, `^1.2`, `1.x`,
//!   `>=1.0, <2.0`) and the repository has semver tags, the highest satisfying tag wins.
//!   Tags may carry a `v` prefix. Otherwise the constraint must equal a tag name exactly.
//! - **Branch**: exact branch name match.
//! - **Commit**: exact hash match in the fetched history.
//! - **None**: no ref is resolved; the caller pulls the default branch tip instead.
//!
//! Every lookup fails closed with an error listing the candidates that were considered.

use anyhow::Result;
use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

use crate::core::PawnpmError;
use crate::dependency::{Constraint, GitDependency};
use crate::git::{GitBackend, TagRef};

/// A commit selected for a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub commit: String,
    /// The tag that satisfied a tag constraint.
    pub tag: Option<String>,
    /// The branch that satisfied a branch constraint.
    pub branch: Option<String>,
}

/// Parses a tag name as a semantic version, accepting a leading `v` or `V`.
#[must_use]
pub fn parse_tag(tag: &str) -> Option<Version> {
    let cleaned = tag.trim_start_matches(['v', 'V']);
    Version::parse(cleaned).ok()
}

/// Parses a tag constraint as a semver requirement; a bare version means exactly that version.
#[must_use]
pub fn parse_requirement(constraint: &str) -> Option<VersionReq> {
    if let Some(version) = parse_tag(constraint) {
        return VersionReq::parse(&format!("={version}")).ok();
    }
    VersionReq::parse(constraint).ok()
}

/// Tag selection over the tags of one repository.
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    tags: Vec<TagRef>,
}

impl VersionResolver {
    #[must_use]
    pub fn new(tags: Vec<TagRef>) -> Self {
        Self { tags }
    }

    pub async fn from_repo<G: GitBackend>(git: &G, path: &Path) -> Result<Self> {
        Ok(Self::new(git.list_tags(path).await?))
    }

    #[must_use]
    pub fn tags(&self) -> &[TagRef] {
        &self.tags
    }

    /// Semver tags, newest first.
    fn versioned(&self) -> Vec<(Version, &TagRef)> {
        let mut versioned: Vec<(Version, &TagRef)> = self
            .tags
            .iter()
            .filter_map(|tag| parse_tag(&tag.name).map(|version| (version, tag)))
            .collect();
        versioned.sort_by(|(a, ta), (b, tb)| compare_candidates(b, tb, a, ta));
        versioned
    }

    /// The tag satisfying `constraint`, see the module documentation for the rules.
    #[must_use]
    pub fn resolve(&self, constraint: &str) -> Option<&TagRef> {
        if let Some(requirement) = parse_requirement(constraint) {
            let found = self
                .versioned()
                .into_iter()
                .find(|(version, _)| requirement.matches(version))
                .map(|(_, tag)| tag);
            if found.is_some() {
                return found;
            }
        }
        self.tags.iter().find(|tag| tag.name == constraint)
    }

    /// Newest tag: highest stable semver, then highest pre-release, then the most recently
    /// committed non-semver tag. Ties break on commit time, then on the greater tag name.
    #[must_use]
    pub fn latest(&self) -> Option<&TagRef> {
        let versioned = self.versioned();
        let stable = versioned.iter().find(|(version, _)| version.pre.is_empty());
        if let Some((_, tag)) = stable.or_else(|| versioned.first()) {
            return Some(*tag);
        }
        self.tags.iter().max_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)))
    }
}

fn compare_candidates(a: &Version, ta: &TagRef, b: &Version, tb: &TagRef) -> Ordering {
    a.cmp_precedence(b)
        .then_with(|| ta.time.cmp(&tb.time))
        .then_with(|| ta.name.cmp(&tb.name))
}

fn tag_names(tags: &[TagRef]) -> Vec<String> {
    tags.iter().map(|tag| tag.name.clone()).collect()
}

/// Resolves the constraint of `dependency` against the clone at `path`.
///
/// Returns `Ok(None)` for an unconstrained dependency.
pub async fn resolve_ref<G: GitBackend>(
    git: &G,
    path: &Path,
    dependency: &GitDependency,
) -> Result<Option<ResolvedRef>> {
    match &dependency.constraint {
        Constraint::None => Ok(None),
        Constraint::Tag(constraint) => {
            let resolver = VersionResolver::from_repo(git, path).await?;
            let tag = resolver.resolve(constraint).ok_or_else(|| PawnpmError::TagNotFound {
                dependency: dependency.to_string(),
                constraint: constraint.clone(),
                available: tag_names(resolver.tags()),
            })?;
            debug!("{dependency}: tag constraint {constraint} resolved to {}", tag.name);
            Ok(Some(ResolvedRef {
                commit: tag.commit.clone(),
                tag: Some(tag.name.clone()),
                branch: None,
            }))
        }
        Constraint::Branch(branch) => {
            let branches = git.list_branches(path).await?;
            let found = branches.iter().find(|b| &b.name == branch).ok_or_else(|| {
                PawnpmError::BranchNotFound {
                    dependency: dependency.to_string(),
                    branch: branch.clone(),
                    available: branches.iter().map(|b| b.name.clone()).collect(),
                }
            })?;
            Ok(Some(ResolvedRef {
                commit: found.commit.clone(),
                tag: None,
                branch: Some(branch.clone()),
            }))
        }
        Constraint::Commit(commit) => {
            let commits = git.list_commits(path).await?;
            if !commits.iter().any(|c| c == commit) {
                return Err(PawnpmError::CommitNotFound {
                    dependency: dependency.to_string(),
                    commit: commit.clone(),
                    available: commits,
                }
                .into());
            }
            Ok(Some(ResolvedRef {
                commit: commit.clone(),
                tag: None,
                branch: None,
            }))
        }
    }
}
