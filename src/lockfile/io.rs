//! I/O operations for lockfile loading and saving.
//!
//! Loading detects the encoding from the content (a leading `{` means JSON, anything else is
//! YAML) so a project can switch its definition format without breaking its lockfile. Saving
//! follows the package definition's format and always goes through an atomic write.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::LockFile;
use crate::constants::LOCKFILE_NAME;
use crate::core::PawnpmError;
use crate::package::DefinitionFormat;
use crate::utils::fs::atomic_write;

impl LockFile {
    /// Location of the lockfile for the project in `dir`.
    #[must_use]
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(LOCKFILE_NAME)
    }

    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        Self::path(dir).is_file()
    }

    /// Loads the lockfile of the project in `dir`.
    ///
    /// Returns `Ok(None)` when there is no lockfile. A lockfile that cannot be parsed, has no
    /// schema version, or was written by a newer schema is an error.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read lockfile: {}\n\n\
                 Possible causes:\n\
                 - Permission denied (check file ownership)\n\
                 - File is locked by another process",
                path.display()
            )
        })?;

        let lockfile = Self::parse(&content, &path)?;
        debug!(
            "loaded lockfile from {} with {} dependencies",
            path.display(),
            lockfile.len()
        );
        Ok(Some(lockfile))
    }

    /// Loads the lockfile, or starts an empty one when the project has none.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        Ok(Self::load(dir)?.unwrap_or_default())
    }

    fn parse(content: &str, path: &Path) -> Result<Self, PawnpmError> {
        let file = path.display().to_string();
        let parsed = match DefinitionFormat::detect(content) {
            DefinitionFormat::Json => serde_json::from_str::<Self>(content).map_err(|e| e.to_string()),
            DefinitionFormat::Yaml => serde_yaml::from_str::<Self>(content).map_err(|e| e.to_string()),
        };
        let lockfile = parsed.map_err(|reason| PawnpmError::LockfileParseError {
            file: file.clone(),
            reason,
        })?;
        lockfile.validate(&file)?;
        Ok(lockfile)
    }

    /// Stamps `generated` and writes the lockfile into `dir` in `format`.
    pub fn save(&mut self, dir: &Path, format: DefinitionFormat) -> Result<()> {
        self.touch();
        let mut bytes = match format {
            DefinitionFormat::Json => {
                serde_json::to_vec_pretty(self).context("Failed to serialize lockfile")?
            }
            DefinitionFormat::Yaml => serde_yaml::to_string(self)
                .context("Failed to serialize lockfile")?
                .into_bytes(),
        };
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }

        let path = Self::path(dir);
        atomic_write(&path, &bytes)
            .with_context(|| format!("Failed to write lockfile {}", path.display()))?;
        debug!("saved lockfile to {} with {} dependencies", path.display(), self.len());
        Ok(())
    }

    /// Removes the lockfile of the project in `dir`; a missing file is fine.
    pub fn delete(dir: &Path) -> Result<()> {
        let path = Self::path(dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove lockfile {}", path.display())),
        }
    }
}
