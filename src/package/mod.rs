//! Package definitions (`pawn.json` / `pawn.yaml`).
//!
//! A package definition lists the dependency strings of a project or of a library fetched
//! into the cache. Only the fields used during resolution are modelled; everything else
//! (runtime and build settings, tooling metadata) is carried through untouched so the pinner
//! can write a definition back without losing user data.
//!
//! ```json
//! {
//!   "user": "Southclaws",
//!   "repo": "my-gamemode",
//!   "entry": "gamemodes/main.pwn",
//!   "output": "gamemodes/main.amx",
//!   "dependencies": ["pawn-lang/samp-stdlib", "Zeex/amx_assembly:^1.0"],
//!   "dev_dependencies": ["pawn-lang/YSI-Includes@5.x"]
//! }
//! ```

pub mod resource;

pub use resource::Resource;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{PACKAGE_FILE_JSON, PACKAGE_FILE_YAML, VENDOR_DIR};
use crate::core::PawnpmError;
use crate::utils::fs::atomic_write;

/// Serialization format of a definition file; lockfiles follow the same format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DefinitionFormat {
    #[default]
    Json,
    Yaml,
}

impl DefinitionFormat {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            DefinitionFormat::Json => PACKAGE_FILE_JSON,
            DefinitionFormat::Yaml => PACKAGE_FILE_YAML,
        }
    }

    /// JSON when `content` starts with `{`, YAML otherwise.
    #[must_use]
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            DefinitionFormat::Json
        } else {
            DefinitionFormat::Yaml
        }
    }
}

impl fmt::Display for DefinitionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DefinitionFormat::Json => "json",
            DefinitionFormat::Yaml => "yaml",
        })
    }
}

/// A parsed package definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub site: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Runtime dependency strings; transitive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Development dependency strings; only honoured for the root package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_dependencies: Vec<String>,

    /// Include directory inside the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,

    /// Fields pawnpm does not interpret, preserved on write
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    /// Directory holding the definition file
    #[serde(skip)]
    pub local_path: PathBuf,

    #[serde(skip)]
    pub format: DefinitionFormat,
}

impl Package {
    /// Runtime dependencies followed by development dependencies.
    #[must_use]
    pub fn all_dependencies(&self) -> Vec<String> {
        self.dependencies.iter().chain(&self.dev_dependencies).cloned().collect()
    }

    /// `user/repo` when the definition names itself, else the directory name.
    #[must_use]
    pub fn name(&self) -> String {
        if !self.user.is_empty() && !self.repo.is_empty() {
            return format!("{}/{}", self.user, self.repo);
        }
        self.local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Repository name used to seed the visited set of a walk.
    #[must_use]
    pub fn repo_name(&self) -> String {
        if self.repo.is_empty() {
            return self.name();
        }
        self.repo.clone()
    }

    #[must_use]
    pub fn vendor_dir(&self) -> PathBuf {
        self.local_path.join(VENDOR_DIR)
    }

    #[must_use]
    pub fn definition_path(&self) -> PathBuf {
        self.local_path.join(self.format.file_name())
    }

    /// Path of the definition file in `dir`, JSON taking precedence over YAML.
    #[must_use]
    pub fn find_definition(dir: &Path) -> Option<(PathBuf, DefinitionFormat)> {
        [DefinitionFormat::Json, DefinitionFormat::Yaml]
            .into_iter()
            .map(|format| (dir.join(format.file_name()), format))
            .find(|(path, _)| path.is_file())
    }

    /// Loads the definition in `dir`; `Ok(None)` when the directory has none.
    pub fn from_dir(dir: &Path) -> Result<Option<Self>> {
        let Some((path, format)) = Self::find_definition(dir) else {
            debug!("no package definition in {}", dir.display());
            return Ok(None);
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read package definition {}", path.display()))?;
        let mut package = Self::parse(&content, format).map_err(|reason| {
            PawnpmError::PackageParseError {
                file: path.display().to_string(),
                reason,
            }
        })?;
        package.local_path = dir.to_path_buf();
        package.format = format;
        Ok(Some(package))
    }

    /// Like [`Package::from_dir`] but a missing definition is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_dir(dir)?.ok_or_else(|| {
            PawnpmError::PackageNotFound {
                path: dir.display().to_string(),
            }
            .into()
        })
    }

    fn parse(content: &str, format: DefinitionFormat) -> Result<Self, String> {
        match format {
            DefinitionFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            DefinitionFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Serialises the definition in its own format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = match self.format {
            DefinitionFormat::Json => serde_json::to_vec_pretty(self)
                .context("Failed to serialize package definition")?,
            DefinitionFormat::Yaml => serde_yaml::to_string(self)
                .context("Failed to serialize package definition")?
                .into_bytes(),
        };
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }
        Ok(bytes)
    }

    /// Writes the definition back to [`Package::definition_path`] atomically.
    pub fn write_definition(&self) -> Result<()> {
        let path = self.definition_path();
        atomic_write(&path, &self.to_bytes()?)
            .with_context(|| format!("Failed to write package definition {}", path.display()))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
