//! Core types shared by every pawnpm module.
//!
//! - [`error`]: the [`PawnpmError`] enum and user-facing [`ErrorContext`] rendering
//! - [`git_errors`]: classification of raw git failures into short, dependency-named messages

pub mod error;
pub mod git_errors;

pub use error::{ErrorContext, PawnpmError, user_friendly_error};
pub use git_errors::{GitErrorKind, classify_git_error, wrap_git_error};
