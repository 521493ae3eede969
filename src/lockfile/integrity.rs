//! Integrity tags recorded next to locked commits.
//!
//! Tags follow `<kind>:<value>`:
//!
//! - `sha256:<64 hex>` hashes the Pawn-relevant content of a directory
//! - `commit:<40 hex>` identifies content by the commit it was checked out at

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub const SHA256_PREFIX: &str = "sha256";
pub const COMMIT_PREFIX: &str = "commit";

const RELEVANT_EXTENSIONS: [&str; 7] = ["inc", "pwn", "json", "yaml", "yml", "md", "txt"];

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_relevant(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| RELEVANT_EXTENSIONS.contains(&ext.as_str()))
}

/// `sha256:` over every non-hidden source, definition and text file below `dir`.
///
/// Files are visited in sorted relative-path order; each contributes its relative path
/// (with `/` separators) followed by its bytes.
pub fn directory_integrity(dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        bail!("directory does not exist: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && is_relevant(entry.path()) {
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((relative, entry.into_path()));
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    let mut buffer = Vec::new();
    for (relative, path) in &files {
        hasher.update(relative.as_bytes());
        buffer.clear();
        std::fs::File::open(path)
            .and_then(|mut file| file.read_to_end(&mut buffer))
            .with_context(|| format!("Failed to hash file: {relative}"))?;
        hasher.update(&buffer);
    }

    Ok(format!("{SHA256_PREFIX}:{}", hex::encode(hasher.finalize())))
}

/// `commit:<sha>`, or an empty string for an empty sha.
#[must_use]
pub fn commit_integrity(commit: &str) -> String {
    if commit.is_empty() {
        return String::new();
    }
    format!("{COMMIT_PREFIX}:{commit}")
}

/// Splits an integrity tag into its kind and value. Untagged input has no kind.
#[must_use]
pub fn parse_integrity(integrity: &str) -> (Option<&str>, &str) {
    match integrity.split_once(':') {
        Some((kind, value)) => (Some(kind), value),
        None => (None, integrity),
    }
}

/// An empty tag is valid (the field is optional); otherwise the value length must match
/// its kind.
#[must_use]
pub fn is_valid_integrity(integrity: &str) -> bool {
    if integrity.is_empty() {
        return true;
    }
    let (kind, value) = parse_integrity(integrity);
    let hex = value.chars().all(|c| c.is_ascii_hexdigit());
    match kind {
        Some(SHA256_PREFIX) => value.len() == 64 && hex,
        Some(COMMIT_PREFIX) => value.len() == 40 && hex,
        _ => false,
    }
}

/// Whether `dir` still hashes to `expected`. An empty expectation always matches.
pub fn verify_integrity(dir: &Path, expected: &str) -> Result<bool> {
    if expected.is_empty() {
        return Ok(true);
    }
    let actual = directory_integrity(dir)?;
    if actual != expected {
        debug!("integrity mismatch for {}: expected {expected}, got {actual}", dir.display());
        return Ok(false);
    }
    Ok(true)
}
