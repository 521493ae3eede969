//! Global constants used throughout the pawnpm codebase.
//!
//! Timeouts, retry parameters and well-known file names that are shared
//! across modules live here so the magic numbers stay discoverable.

use std::time::Duration;

/// Name of the JSON package definition file.
pub const PACKAGE_FILE_JSON: &str = "pawn.json";

/// Name of the YAML package definition file.
pub const PACKAGE_FILE_YAML: &str = "pawn.yaml";

/// Name of the lockfile written next to the package definition.
pub const LOCKFILE_NAME: &str = "pawn.lock";

/// Directory inside a project that receives vendored dependency copies.
pub const VENDOR_DIR: &str = "dependencies";

/// Git hosting site assumed when a specifier does not name one.
pub const DEFAULT_SITE: &str = "github.com";

/// History depth used for cache clones and pulls.
///
/// Deep enough to reach typical release tags without pulling unbounded history.
pub const CLONE_DEPTH: u32 = 1000;

/// Timeout for `git clone` of a dependency into the cache.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for `git pull`/`git fetch` on an existing cache entry.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for local git operations (status, rev-parse, checkout).
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for requests against the hosting site's HTTP API and the override feed.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a cached copy of the remote override feed stays fresh.
pub const OVERRIDE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Number of retries the installer performs per dependency after the first attempt.
pub const ENSURE_RETRIES: usize = 1;

/// Constant delay between installer retries, in milliseconds.
pub const ENSURE_RETRY_DELAY_MS: u64 = 100;

/// Maximum number of delete-and-reclone attempts when a cache entry cannot be recovered.
pub const MAX_RECLONE_ATTEMPTS: u32 = 1;

/// Number of candidates listed in a "not found" error before the list is truncated.
pub const MAX_LISTED_CANDIDATES: usize = 25;
