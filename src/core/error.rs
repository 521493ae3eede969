//! Error handling for pawnpm
//!
//! This module provides the typed error enum used across the crate and the user-facing
//! rendering of failures. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can match on precise failure kinds
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Specifier parsing**: [`PawnpmError::InvalidSpecifier`], [`PawnpmError::InvalidCommitLength`],
//!   [`PawnpmError::InvalidVersionSpecifier`], [`PawnpmError::InvalidDependency`]
//! - **Git operations**: [`PawnpmError::GitNotFound`], [`PawnpmError::GitCommandError`],
//!   [`PawnpmError::GitCloneFailed`], [`PawnpmError::GitCheckoutFailed`], [`PawnpmError::GitRepoInvalid`]
//! - **Version resolution**: [`PawnpmError::TagNotFound`], [`PawnpmError::BranchNotFound`],
//!   [`PawnpmError::CommitNotFound`]; each carries the candidates that were inspected
//! - **Project files**: [`PawnpmError::PackageNotFound`], [`PawnpmError::PackageParseError`],
//!   [`PawnpmError::LockfileParseError`], [`PawnpmError::LockfileVersionMissing`],
//!   [`PawnpmError::LockfileVersionUnsupported`]
//!
//! Use [`user_friendly_error`] to convert any [`anyhow::Error`] into an [`ErrorContext`]
//! with a suggestion and details for display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pawnpm_cli::core::{PawnpmError, user_friendly_error};
//!
//! let err = anyhow::Error::from(PawnpmError::GitNotFound);
//! user_friendly_error(err).display();
//! ```

use crate::constants::MAX_LISTED_CANDIDATES;
use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Renders a candidate list for "not found" errors, truncating very long lists.
pub fn format_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        return "(none)".to_string();
    }
    if candidates.len() <= MAX_LISTED_CANDIDATES {
        return candidates.join(", ");
    }
    format!(
        "{}, ... ({} more)",
        candidates[..MAX_LISTED_CANDIDATES].join(", "),
        candidates.len() - MAX_LISTED_CANDIDATES
    )
}

/// The main error type for pawnpm operations.
#[derive(Error, Debug)]
pub enum PawnpmError {
    /// A dependency string could not be parsed at all
    #[error("invalid dependency string '{specifier}': {reason}")]
    InvalidSpecifier {
        /// The raw specifier as written in the package definition
        specifier: String,
        /// Why the parser rejected it
        reason: String,
    },

    /// A `#`-introduced commit hash was not exactly 40 characters long
    #[error("dependency string specifies a commit hash with an incorrect length ({length})")]
    InvalidCommitLength {
        /// Length of the hash that was supplied
        length: usize,
    },

    /// Text following the repository name did not start with `:`, `@` or `#`
    #[error("invalid version specifier in '{specifier}'")]
    InvalidVersionSpecifier {
        /// The raw specifier
        specifier: String,
    },

    /// A parsed dependency failed structural validation
    #[error("invalid dependency '{name}': {reason}")]
    InvalidDependency {
        /// Rendered dependency
        name: String,
        /// Validation failure
        reason: String,
    },

    /// Git operation failed during execution
    ///
    /// # Fields
    /// - `operation`: The git operation that failed (e.g., "clone", "pull", "checkout")
    /// - `stderr`: The error output from the git command
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A cache or vendor directory is not a healthy git repository
    #[error("Not a valid git repository: {path} ({reason})")]
    GitRepoInvalid {
        /// Repository path
        path: String,
        /// Failed checks
        reason: String,
    },

    /// Cloning a repository failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// URL being cloned
        url: String,
        /// Git's stderr
        reason: String,
    },

    /// Checking out a reference failed
    #[error("Failed to checkout reference '{reference}' in repository")]
    GitCheckoutFailed {
        /// The reference that could not be checked out
        reference: String,
        /// Git's stderr
        reason: String,
    },

    /// No tag satisfied a tag or semver constraint
    #[error("no tag matching '{constraint}' in {dependency}; tags seen: {}", format_candidates(.available))]
    TagNotFound {
        /// Rendered dependency
        dependency: String,
        /// Constraint string
        constraint: String,
        /// Every tag that was considered
        available: Vec<String>,
    },

    /// No branch with the requested name exists
    #[error("no branch named '{branch}' in {dependency}; branches seen: {}", format_candidates(.available))]
    BranchNotFound {
        /// Rendered dependency
        dependency: String,
        /// Requested branch
        branch: String,
        /// Every branch that was considered
        available: Vec<String>,
    },

    /// The requested commit is not in the fetched history
    #[error("commit '{commit}' not found in {dependency}; commits seen: {}", format_candidates(.available))]
    CommitNotFound {
        /// Rendered dependency
        dependency: String,
        /// Requested commit
        commit: String,
        /// Commits scanned, newest first
        available: Vec<String>,
    },

    /// No package definition exists in a directory
    #[error("no package definition (pawn.json or pawn.yaml) found in {path}")]
    PackageNotFound {
        /// Directory that was searched
        path: String,
    },

    /// A package definition exists but could not be parsed
    #[error("Invalid package definition syntax in {file}")]
    PackageParseError {
        /// Definition file
        file: String,
        /// Parser message
        reason: String,
    },

    /// A lockfile exists but could not be parsed
    #[error("Invalid lockfile syntax in {file}")]
    LockfileParseError {
        /// Lockfile path
        file: String,
        /// Parser message
        reason: String,
    },

    /// A lockfile has no schema version or a zero version
    #[error("lockfile version is not set in {file}")]
    LockfileVersionMissing {
        /// Lockfile path
        file: String,
    },

    /// A lockfile was written by a newer, incompatible tool version
    #[error("lockfile version {version} in {file} is newer than supported version {supported}")]
    LockfileVersionUnsupported {
        /// Lockfile path
        file: String,
        /// Version found on disk
        version: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// Network error during an HTTP operation
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being attempted
        operation: String,
        /// Underlying failure
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Semver parsing error
    #[error("Semver parsing error: {0}")]
    SemverError(#[from] semver::Error),

    /// Catch-all
    #[error("{message}")]
    Other {
        /// Description
        message: String,
    },
}

impl Clone for PawnpmError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidSpecifier { specifier, reason } => Self::InvalidSpecifier {
                specifier: specifier.clone(),
                reason: reason.clone(),
            },
            Self::InvalidCommitLength { length } => Self::InvalidCommitLength { length: *length },
            Self::InvalidVersionSpecifier { specifier } => Self::InvalidVersionSpecifier {
                specifier: specifier.clone(),
            },
            Self::InvalidDependency { name, reason } => Self::InvalidDependency {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::GitCommandError { operation, stderr } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitRepoInvalid { path, reason } => Self::GitRepoInvalid {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::GitCloneFailed { url, reason } => Self::GitCloneFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::GitCheckoutFailed { reference, reason } => Self::GitCheckoutFailed {
                reference: reference.clone(),
                reason: reason.clone(),
            },
            Self::TagNotFound { dependency, constraint, available } => Self::TagNotFound {
                dependency: dependency.clone(),
                constraint: constraint.clone(),
                available: available.clone(),
            },
            Self::BranchNotFound { dependency, branch, available } => Self::BranchNotFound {
                dependency: dependency.clone(),
                branch: branch.clone(),
                available: available.clone(),
            },
            Self::CommitNotFound { dependency, commit, available } => Self::CommitNotFound {
                dependency: dependency.clone(),
                commit: commit.clone(),
                available: available.clone(),
            },
            Self::PackageNotFound { path } => Self::PackageNotFound { path: path.clone() },
            Self::PackageParseError { file, reason } => Self::PackageParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::LockfileParseError { file, reason } => Self::LockfileParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::LockfileVersionMissing { file } => Self::LockfileVersionMissing {
                file: file.clone(),
            },
            Self::LockfileVersionUnsupported { file, version, supported } => {
                Self::LockfileVersionUnsupported {
                    file: file.clone(),
                    version: *version,
                    supported: *supported,
                }
            }
            Self::NetworkError { operation, reason } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError { message } => Self::ConfigError { message: message.clone() },
            // io::Error and semver::Error are not Clone; keep the message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::SemverError(e) => Self::Other { message: e.to_string() },
            Self::Other { message } => Self::Other { message: message.clone() },
        }
    }
}

/// Error wrapper carrying a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: PawnpmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: PawnpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Typed [`PawnpmError`]s anywhere in the chain get tailored suggestions; IO errors are
/// mapped by kind; everything else is rendered with its full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(pawnpm_error) = error.chain().find_map(|e| e.downcast_ref::<PawnpmError>()) {
        let mut ctx = create_error_context(pawnpm_error.clone());
        // Keep the outer context (dependency name) visible
        if error.downcast_ref::<PawnpmError>().is_none() && ctx.details.is_none() {
            ctx.details = Some(error.to_string());
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(PawnpmError::Other {
                    message: format!("permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership and permissions of the project and cache directories");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(PawnpmError::Other {
                    message: format!("file not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(PawnpmError::Other { message })
}

fn create_error_context(error: PawnpmError) -> ErrorContext {
    match &error {
        PawnpmError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ or your package manager (e.g., 'brew install git', 'apt install git')")
            .with_details("pawnpm shells out to git to clone and update dependency repositories"),

        PawnpmError::InvalidCommitLength { .. } => ErrorContext::new(error)
            .with_suggestion("Use the full 40 character commit SHA after '#', e.g. 'owner/repo#<sha>'"),

        PawnpmError::InvalidSpecifier { .. } | PawnpmError::InvalidVersionSpecifier { .. } => {
            ErrorContext::new(error).with_suggestion(
                "Dependencies are written as 'owner/repo', 'owner/repo:1.2.3', 'owner/repo@branch' or 'owner/repo#<commit>'",
            )
        }

        PawnpmError::TagNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Relax the version constraint or pick one of the listed tags"),

        PawnpmError::BranchNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Check the branch name; branch constraints are written as 'owner/repo@branch'"),

        PawnpmError::CommitNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'pawnpm ensure --update' to refresh the cache, or check that the commit exists upstream"),

        PawnpmError::GitCloneFailed { url, .. } => {
            let suggestion = format!(
                "Verify the repository URL is correct: {url}. Check your internet connection and repository access"
            );
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("Clone operations can fail due to invalid URLs, network issues, or access restrictions")
        }

        PawnpmError::GitCommandError { stderr, .. } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error)
                .with_suggestion("Check your git configuration and repository access. Try running the git command manually for more details")
                .with_details(details)
        }

        PawnpmError::PackageNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run the command from a package directory or create a pawn.json file"),

        PawnpmError::LockfileVersionUnsupported { .. } => ErrorContext::new(error)
            .with_suggestion("Upgrade pawnpm to a version that understands this lockfile format"),

        PawnpmError::LockfileVersionMissing { .. } | PawnpmError::LockfileParseError { .. } => {
            ErrorContext::new(error)
                .with_suggestion("The lockfile is corrupt; delete pawn.lock and run 'pawnpm ensure' to regenerate it")
        }

        PawnpmError::PackageParseError { reason, .. } => {
            let details = reason.clone();
            ErrorContext::new(error).with_details(details)
        }

        PawnpmError::NetworkError { reason, .. } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Check your internet connection and try again")
                .with_details(details)
        }

        _ => ErrorContext::new(error),
    }
}
