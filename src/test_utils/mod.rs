//! Test utilities for pawnpm
//!
//! Available to unit tests and, through the `test-utils` feature, to integration tests.
//!
//! - [`FakeGit`] is an in-memory [`GitBackend`](crate::git::GitBackend) for exercising the
//!   cache, the graph builder and the installer without a `git` binary or network
//! - [`TestGit`] drives the real `git` binary to build local repositories for
//!   [`SystemGit`](crate::git::SystemGit) tests
//! - [`init_test_logging`] installs a tracing subscriber that writes through the test harness
//!
//! # Example
//!
//! ```rust,no_run
//! use pawnpm_cli::test_utils::{FakeGit, FakeRepo};
//!
//! let git = FakeGit::new();
//! git.add_repo(FakeRepo::new("user", "lib").with_commit("first").with_tag("1.0.0"));
//! ```

pub mod fake_git;
pub mod git_helper;

pub use fake_git::{FakeGit, FakeRepo};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `None` the `RUST_LOG` variable decides, and nothing
/// is installed when it is unset.
///
/// ```bash
/// RUST_LOG=pawnpm_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
