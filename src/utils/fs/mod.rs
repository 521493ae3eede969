//! File system helpers shared by the cache, the vendor directory and the lockfile.
//!
//! Anything that may be read back by a later run (lockfile, package definition, override
//! cache) is written through [`atomic_write`], so a crash never leaves a truncated file.

pub mod atomic;
pub mod dirs;

// Directory operations
pub use dirs::{ensure_dir, remove_dir_all};

// Atomic write operations
pub use atomic::atomic_write;
