//! Location of pawnpm's global directories.
//!
//! Two directories live outside any project:
//!
//! - the **cache** directory holds one git clone per repository identity under
//!   `packages/<owner>/<repo>/<branch or default>`
//! - the **config** directory holds the dependency override files
//!
//! # Environment Variables
//!
//! - `PAWNPM_CACHE_DIR`: replaces the cache directory
//! - `PAWNPM_CONFIG_DIR`: replaces the config directory
//!
//! Both are primarily meant for tests and CI, where isolated directories keep runs independent.
//!
//! # Default Locations
//!
//! | Platform | Cache | Config |
//! |----------|-------|--------|
//! | Linux/macOS | `~/.pawnpm/cache` | `~/.pawnpm` |
//! | Windows | `%LOCALAPPDATA%\pawnpm\cache` | `%LOCALAPPDATA%\pawnpm` |

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable replacing the cache directory.
pub const CACHE_DIR_ENV: &str = "PAWNPM_CACHE_DIR";

/// Environment variable replacing the config directory.
pub const CONFIG_DIR_ENV: &str = "PAWNPM_CONFIG_DIR";

fn env_dir(name: &str) -> Option<PathBuf> {
    let value = std::env::var(name).ok().filter(|value| !value.is_empty())?;
    Some(PathBuf::from(shellexpand::tilde(&value).into_owned()))
}

fn base_dir() -> Result<PathBuf> {
    if cfg!(target_os = "windows") {
        Ok(dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("pawnpm"))
    } else {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".pawnpm"))
    }
}

fn ensure_created(dir: PathBuf) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(dir)
}

/// Returns the cache directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the directory cannot be
/// created.
pub fn get_cache_dir() -> Result<PathBuf> {
    // Check for environment variable override first (essential for testing)
    if let Some(dir) = env_dir(CACHE_DIR_ENV) {
        return ensure_created(dir);
    }
    ensure_created(base_dir()?.join("cache"))
}

/// Returns the config directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the directory cannot be
/// created.
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env_dir(CONFIG_DIR_ENV) {
        return ensure_created(dir);
    }
    ensure_created(base_dir()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_env_overrides() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("cache");
        let config = temp.path().join("config");

        // SAFETY: serialized with every other test touching these variables
        unsafe {
            std::env::set_var(CACHE_DIR_ENV, &cache);
            std::env::set_var(CONFIG_DIR_ENV, &config);
        }

        assert_eq!(get_cache_dir().unwrap(), cache);
        assert_eq!(get_config_dir().unwrap(), config);
        assert!(cache.is_dir());
        assert!(config.is_dir());

        unsafe {
            std::env::remove_var(CACHE_DIR_ENV);
            std::env::remove_var(CONFIG_DIR_ENV);
        }
    }

    #[test]
    #[serial]
    fn test_default_cache_dir() {
        unsafe {
            std::env::remove_var(CACHE_DIR_ENV);
        }
        let dir = get_cache_dir().unwrap();
        assert!(dir.to_string_lossy().contains("pawnpm"));
    }
}
