//! Dependency override table.
//!
//! Upstream repositories move, get deleted or go stale. The override table rewrites
//! dependency strings before they are parsed so a project keeps resolving without editing
//! its package definition.
//!
//! # Layers
//!
//! Three layers are merged in increasing precedence:
//!
//! 1. **Built-in** redirects for known-dead repositories compiled into the binary
//! 2. **Remote** feed fetched from [`DEFAULT_OVERRIDES_URL`] and cached for 24 hours in
//!    `<config_dir>/remote-dependency-overrides.json` (see [`remote`])
//! 3. **Local** user file `<config_dir>/dependency-overrides.json`
//!
//! Both files share the shape `{"overrides": {"original": "replacement"}}`.
//!
//! # Matching
//!
//! For a specifier `s`, the first rule that matches wins:
//!
//! 1. `s` is a key
//! 2. `s` without an `http://`/`https://` prefix is a key
//! 3. the part of `s` before its version suffix (`:`, `@` or `#` after the last `/`) is a key;
//!    the suffix is carried over onto the replacement unless the replacement pins its own
//! 4. some key's trailing `owner/repo` occurs in `s` as a whole segment; it is replaced in place
//!
//! Rewrites are applied until a fixed point is reached, so chained redirects resolve fully and
//! `rewrite(rewrite(s)) == rewrite(s)`. A redirect cycle leaves the input unchanged.

pub mod remote;

pub use remote::{DEFAULT_OVERRIDES_URL, HttpOverrideSource, OverrideSource, load_remote_overrides};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::OVERRIDE_CACHE_TTL;
use crate::utils::fs::atomic_write;

/// File name of the user-editable override file inside the config directory.
pub const LOCAL_OVERRIDES_FILE: &str = "dependency-overrides.json";

/// File name of the cached remote feed inside the config directory.
pub const REMOTE_OVERRIDES_CACHE_FILE: &str = "remote-dependency-overrides.json";

const BUILTIN_OVERRIDES: &[(&str, &str)] = &[
    (
        "github.com/Zeex/samp-plugin-crashdetect",
        "github.com/AmyrAhmady/samp-plugin-crashdetect",
    ),
    ("Zeex/samp-plugin-crashdetect", "AmyrAhmady/samp-plugin-crashdetect"),
];

/// Bound on chained rewrites; chains longer than this are treated like cycles.
const MAX_REWRITE_CHAIN: usize = 16;

/// On-disk shape of override files.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideFile {
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

/// Merged override table consulted before every specifier is parsed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OverrideTable {
    entries: BTreeMap<String, String>,
}

impl OverrideTable {
    /// An empty table; rewrites are the identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the compiled-in redirects.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_OVERRIDES
                .iter()
                .map(|(original, replacement)| ((*original).to_string(), (*replacement).to_string()))
                .collect(),
        }
    }

    /// Merges the three layers; later layers replace earlier entries.
    #[must_use]
    pub fn from_layers(
        remote: BTreeMap<String, String>,
        local: BTreeMap<String, String>,
    ) -> Self {
        let mut table = Self::builtin();
        table.entries.extend(remote);
        table.entries.extend(local);
        table
    }

    /// Loads all three layers from `config_dir`.
    ///
    /// Never fails: an unreachable feed or an unreadable local file only drops that layer.
    pub async fn load<S: OverrideSource>(config_dir: &Path, source: &S) -> Self {
        let remote =
            load_remote_overrides(&remote_cache_path(config_dir), source, OVERRIDE_CACHE_TTL).await;
        let local = match load_local(config_dir) {
            Ok(local) => local,
            Err(e) => {
                debug!("ignoring local dependency overrides: {e:#}");
                BTreeMap::new()
            }
        };
        debug!(
            "loaded {} remote and {} local dependency overrides",
            remote.len(),
            local.len()
        );
        Self::from_layers(remote, local)
    }

    pub fn insert(&mut self, original: impl Into<String>, replacement: impl Into<String>) {
        self.entries.insert(original.into(), replacement.into());
    }

    #[must_use]
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites `spec` to its redirected target, or returns it unchanged.
    pub fn rewrite(&self, spec: &str) -> String {
        let mut current = spec.to_string();
        let mut seen = HashSet::from([current.clone()]);

        for _ in 0..MAX_REWRITE_CHAIN {
            let Some(next) = self.rewrite_once(&current) else {
                if current != spec {
                    info!("dependency '{spec}' was overridden by '{current}'");
                }
                return current;
            };
            if !seen.insert(next.clone()) {
                break;
            }
            current = next;
        }

        debug!("dependency override chain for '{spec}' does not settle, ignoring overrides");
        spec.to_string()
    }

    /// A single rewrite step; `None` when no rule changes the string.
    fn rewrite_once(&self, spec: &str) -> Option<String> {
        let changed = |candidate: String| (candidate != spec).then_some(candidate);

        if let Some(replacement) = self.entries.get(spec) {
            return changed(replacement.clone());
        }

        let normalized = strip_protocol(spec);
        if let Some(replacement) = self.entries.get(normalized) {
            return changed(replacement.clone());
        }

        let versioned = split_version_suffix(normalized)
            .and_then(|(base, version)| self.entries.get(base).map(|r| (r, version)));
        if let Some((replacement, version)) = versioned {
            if has_explicit_version(replacement) {
                return changed(replacement.clone());
            }
            return changed(format!("{replacement}{version}"));
        }

        for (original, replacement) in &self.entries {
            if has_explicit_version(original) {
                continue;
            }
            let Some(owner_repo) = trailing_owner_repo(original) else {
                continue;
            };
            let Some(start) = find_segment(spec, owner_repo) else {
                continue;
            };
            let target = replacement.strip_prefix("github.com/").unwrap_or(replacement);
            let target = strip_protocol(target);
            let end = start + owner_repo.len();
            let rest = &spec[end..];
            let rewritten = match split_version_suffix(target) {
                Some((target_base, target_version)) => {
                    let rest_path = rest.find([':', '@', '#']).map_or(rest, |i| &rest[..i]);
                    format!("{}{target_base}{rest_path}{target_version}", &spec[..start])
                }
                None => format!("{}{target}{rest}", &spec[..start]),
            };
            return changed(rewritten);
        }

        None
    }
}

fn strip_protocol(spec: &str) -> &str {
    spec.strip_prefix("https://")
        .or_else(|| spec.strip_prefix("http://"))
        .unwrap_or(spec)
}

/// Splits at the first `:`, `@` or `#` after the last `/`.
fn split_version_suffix(spec: &str) -> Option<(&str, &str)> {
    let last_segment = spec.rfind('/').map_or(0, |i| i + 1);
    let offset = spec[last_segment..].find([':', '@', '#'])?;
    let idx = last_segment + offset;
    Some((&spec[..idx], &spec[idx..]))
}

fn has_explicit_version(spec: &str) -> bool {
    split_version_suffix(strip_protocol(spec)).is_some()
}

fn trailing_owner_repo(spec: &str) -> Option<&str> {
    let mut slashes = spec.rmatch_indices('/');
    slashes.next()?;
    match slashes.next() {
        Some((idx, _)) => Some(&spec[idx + 1..]),
        None => Some(spec),
    }
}

/// Finds `needle` in `haystack` bounded by `/` or the string ends on the left and by
/// `/`, a version separator or the end on the right.
fn find_segment(haystack: &str, needle: &str) -> Option<usize> {
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let left_ok = i == 0 || haystack[..i].ends_with('/');
        let right = &haystack[i + needle.len()..];
        let right_ok = right.is_empty() || right.starts_with(['/', ':', '@', '#']);
        left_ok && right_ok
    })
}

/// `<config_dir>/dependency-overrides.json`
#[must_use]
pub fn local_overrides_path(config_dir: &Path) -> PathBuf {
    config_dir.join(LOCAL_OVERRIDES_FILE)
}

/// `<config_dir>/remote-dependency-overrides.json`
#[must_use]
pub fn remote_cache_path(config_dir: &Path) -> PathBuf {
    config_dir.join(REMOTE_OVERRIDES_CACHE_FILE)
}

/// Reads the user-editable override file; a missing file is an empty table.
pub fn load_local(config_dir: &Path) -> Result<BTreeMap<String, String>> {
    let path = local_overrides_path(config_dir);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: OverrideFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(file.overrides)
}

/// Atomically replaces the user-editable override file.
pub fn save_local(config_dir: &Path, overrides: &BTreeMap<String, String>) -> Result<()> {
    let path = local_overrides_path(config_dir);
    let file = OverrideFile {
        overrides: overrides.clone(),
    };
    let content = serde_json::to_string_pretty(&file).context("Failed to serialize overrides")?;
    atomic_write(&path, content.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Deletes the cached remote feed so the next load fetches it again.
pub fn clear_remote_cache(config_dir: &Path) -> Result<()> {
    let path = remote_cache_path(config_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
