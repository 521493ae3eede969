//! pawnpm - a package manager for Pawn projects
//!
//! Dependencies are git repositories declared as specifier strings in `pawn.json` (or
//! `pawn.yaml`). pawnpm resolves them into a flat graph, vendors each into
//! `<project>/dependencies/<repo>` and records the resolved commits in `pawn.lock` so the next
//! run reproduces the same tree.
//!
//! # Pipeline
//!
//! 1. [`overrides`] rewrites each declared string (redirects for moved repositories)
//! 2. [`dependency`] parses it into a [`dependency::Dependency`]
//! 3. [`cache`] keeps one clone per repository under the cache directory and checks out the
//!    ref picked by [`version`]
//! 4. [`resolver`] walks the graph depth-first, reading nested package definitions from the
//!    cache
//! 5. [`installer`] clones every entry from the cache into the project and updates
//!    [`lockfile`]
//!
//! [`pinner`] optionally rewrites unconstrained declarations to their latest tag before all
//! of this.
//!
//! # Package Definition
//!
//! ```json
//! {
//!   "user": "me",
//!   "repo": "gamemode",
//!   "entry": "gamemodes/main.pwn",
//!   "dependencies": [
//!     "pawn-lang/samp-stdlib:0.3.7",
//!     "pawn-lang/YSI-Includes@5.x",
//!     "plugin://local/plugins/streamer"
//!   ],
//!   "dev_dependencies": ["pawn-lang/pawntest"]
//! }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - per-repository clone store with repair and re-clone recovery
//! - [`cli`] - command-line interface
//! - [`config`] - cache and config directory discovery
//! - [`constants`] - file names, timeouts and retry limits
//! - [`core`] - error types and user-facing error rendering
//! - [`dependency`] - specifier grammar and dependency descriptors
//! - [`git`] - the [`git::GitBackend`] boundary and its system `git` implementation
//! - [`installer`] - vendoring of a resolved graph
//! - [`lockfile`] - `pawn.lock` model, I/O and session bookkeeping
//! - [`overrides`] - built-in, remote and local dependency redirects
//! - [`package`] - package definitions and resources
//! - [`pinner`] - pinning of unconstrained dependencies
//! - [`resolver`] - dependency graph construction
//! - [`utils`] - filesystem, platform, progress and retry helpers
//! - [`version`] - tag and semver resolution

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod dependency;
pub mod git;
pub mod installer;
pub mod lockfile;
pub mod overrides;
pub mod package;
pub mod pinner;
pub mod resolver;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
