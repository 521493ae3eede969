//! Cross-cutting helpers: atomic file IO, retry backoff, platform detection and progress.

pub mod backoff;
pub mod fs;
pub mod platform;
pub mod progress;

pub use backoff::retry_with_fixed_backoff;
pub use fs::{atomic_write, ensure_dir, remove_dir_all};
pub use platform::{Platform, get_git_command, is_windows};
pub use progress::ProgressBar;
