//! Extra files a package ships alongside its include files, usually release archives holding
//! plugin binaries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::utils::Platform;

/// A resource declared in a package definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Filename pattern of the release asset
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Target platform; a resource for another platform is ignored
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,

    /// Server version the resource belongs to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Whether the asset is an archive rather than a single file
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub archive: bool,

    /// Archive directories holding `.inc` files for the compiler
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// Archive paths of plugin binaries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,

    /// Other archive members mapped to extraction paths
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
}

impl Resource {
    #[must_use]
    pub fn matches_platform(&self, platform: Platform) -> bool {
        self.platform == platform.as_str()
    }

    /// Whether the resource delivers a server plugin for `platform`.
    ///
    /// Archives count when they list plugin paths; single files count when their name carries
    /// the platform's binary extension.
    #[must_use]
    pub fn is_plugin(&self, platform: Platform) -> bool {
        if self.archive {
            return !self.plugins.is_empty();
        }
        let extension = platform.binary_extension().trim_start_matches('.');
        self.name.contains(extension)
    }

    /// Extraction directory for this resource, relative to the vendor directory.
    ///
    /// `.resources/<repo>-<hex>` where `<hex>` is the first three bytes of the SHA-256 of the
    /// resource name, so differently named assets of one repository never collide.
    #[must_use]
    pub fn path(&self, repo: &str) -> PathBuf {
        let digest = Sha256::digest(self.name.as_bytes());
        PathBuf::from(".resources").join(format!("{repo}-{}", hex::encode(&digest[..3])))
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("missing name field in resource");
        }
        if self.platform.is_empty() {
            return Err("missing platform field in resource");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, archive: bool) -> Resource {
        Resource {
            name: name.to_string(),
            platform: "linux".to_string(),
            archive,
            ..Resource::default()
        }
    }

    #[test]
    fn test_plugin_detection() {
        assert!(resource("streamer.so", false).is_plugin(Platform::Linux));
        assert!(!resource("streamer.so", false).is_plugin(Platform::Windows));
        assert!(resource("crashdetect.dll", false).is_plugin(Platform::Windows));

        let mut archive = resource("^streamer-(.*)\\.tar\\.gz$", true);
        assert!(!archive.is_plugin(Platform::Linux));
        archive.plugins.push("plugins/streamer.so".to_string());
        assert!(archive.is_plugin(Platform::Linux));
    }

    #[test]
    fn test_path_is_stable_per_name() {
        let a = resource("streamer-linux.tar.gz", true);
        let b = resource("streamer-win32.zip", true);
        let path = a.path("samp-streamer-plugin");
        assert_eq!(path, a.path("samp-streamer-plugin"));
        assert_ne!(path, b.path("samp-streamer-plugin"));

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(path.starts_with(".resources"));
        assert_eq!(name.len(), "samp-streamer-plugin-".len() + 6);
    }

    #[test]
    fn test_validate() {
        assert!(resource("a.so", false).validate().is_ok());
        assert!(Resource::default().validate().is_err());
        assert!(
            Resource {
                name: "a.so".to_string(),
                ..Resource::default()
            }
            .validate()
            .is_err()
        );
    }
}
