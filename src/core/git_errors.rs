//! Classification of git failures into short, actionable messages.
//!
//! Git's own stderr is verbose and differs between transports. Before a failure crosses the
//! cache layer boundary it is wrapped with the dependency it belongs to and a one-line hint, so a
//! failure deep in the graph still names the package that caused it.

use std::fmt;

use crate::core::PawnpmError;
use crate::dependency::GitDependency;

/// Broad category of a git failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitErrorKind {
    Authentication,
    NotFound,
    Network,
    Blocked,
    Other,
}

impl GitErrorKind {
    /// Short hint appended after the dependency name.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            GitErrorKind::Authentication => {
                Some("authentication required (repo may be private or not exist)")
            }
            GitErrorKind::NotFound => Some("repository not found (check URL or may be private)"),
            GitErrorKind::Network => Some("network error - check internet connection"),
            GitErrorKind::Blocked => Some("repository access blocked"),
            GitErrorKind::Other => None,
        }
    }
}

impl fmt::Display for GitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GitErrorKind::Authentication => "authentication",
            GitErrorKind::NotFound => "not found",
            GitErrorKind::Network => "network",
            GitErrorKind::Blocked => "blocked",
            GitErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Classifies a failure by scanning its message text.
#[must_use]
pub fn classify_git_error(message: &str) -> GitErrorKind {
    let lower = message.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));

    if any(&["repository access blocked"]) {
        GitErrorKind::Blocked
    } else if any(&[
        "authentication required",
        "authentication failed",
        "could not read username",
        "permission denied (publickey)",
    ]) {
        GitErrorKind::Authentication
    } else if any(&["repository not found", "not found", "does not appear to be a git repository"])
    {
        GitErrorKind::NotFound
    } else if any(&[
        "network is unreachable",
        "no such host",
        "could not resolve host",
        "connection refused",
        "timeout",
        "timed out",
    ]) {
        GitErrorKind::Network
    } else {
        GitErrorKind::Other
    }
}

/// The rendered chain plus the git output carried inside typed errors.
fn failure_text(err: &anyhow::Error) -> String {
    let mut text = format!("{err:#}");
    for cause in err.chain() {
        match cause.downcast_ref::<PawnpmError>() {
            Some(
                PawnpmError::GitCloneFailed { reason, .. }
                | PawnpmError::GitCheckoutFailed { reason, .. }
                | PawnpmError::GitRepoInvalid { reason, .. }
                | PawnpmError::NetworkError { reason, .. },
            ) => {
                text.push('\n');
                text.push_str(reason);
            }
            Some(PawnpmError::GitCommandError { stderr, .. }) => {
                text.push('\n');
                text.push_str(stderr);
            }
            _ => {}
        }
    }
    text
}

/// Wraps `err` with the dependency's name and a category hint.
///
/// The original error stays in the chain, so typed errors remain reachable through
/// `downcast_ref`.
pub fn wrap_git_error(err: anyhow::Error, dependency: &GitDependency) -> anyhow::Error {
    let resolution_failure = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<PawnpmError>(),
            Some(
                PawnpmError::TagNotFound { .. }
                    | PawnpmError::BranchNotFound { .. }
                    | PawnpmError::CommitNotFound { .. }
            )
        )
    });
    let kind = if resolution_failure {
        GitErrorKind::Other
    } else {
        classify_git_error(&failure_text(&err))
    };
    let name = dependency.name();
    match kind.hint() {
        Some(hint) => err.context(format!("dependency '{name}': {hint}")),
        None => err.context(format!("dependency '{name}'")),
    }
}
