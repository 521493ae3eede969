//! Handlers for URL-scheme dependencies.
//!
//! Each [`UrlScheme`] maps to one [`SchemeHandler`] in a lookup table. A handler decides what
//! a scheme dependency contributes to the graph on top of the dependency itself: a plugin
//! entry, an extra include path, or nothing.
//!
//! | Scheme | Local (`scheme://local/<path>`) | Remote (`scheme://owner/repo`) |
//! |--------|-------------------------------|--------------------------------|
//! | `plugin`, `component` | plugin | plugin |
//! | `includes` | `<project>/<path>` | `<project>/dependencies/<repo>[/<path>]` |
//! | `filterscript` | existence check | nothing |

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use crate::constants::VENDOR_DIR;
use crate::dependency::{GitDependency, UrlScheme};

/// What a scheme dependency adds to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    Plugin,
    IncludePath(PathBuf),
    Nothing,
}

type LocalHandler = fn(project_dir: &Path, path: &str) -> Result<Contribution>;
type RemoteHandler = fn(project_dir: &Path, remote: &GitDependency) -> Contribution;

/// Local and remote behaviour of one scheme.
#[derive(Clone, Copy)]
pub struct SchemeHandler {
    pub scheme: UrlScheme,
    pub local: LocalHandler,
    pub remote: RemoteHandler,
}

static HANDLERS: [SchemeHandler; 4] = [
    SchemeHandler {
        scheme: UrlScheme::Plugin,
        local: local_binary,
        remote: remote_binary,
    },
    SchemeHandler {
        scheme: UrlScheme::Component,
        local: local_binary,
        remote: remote_binary,
    },
    SchemeHandler {
        scheme: UrlScheme::Includes,
        local: local_includes,
        remote: remote_includes,
    },
    SchemeHandler {
        scheme: UrlScheme::Filterscript,
        local: local_filterscript,
        remote: remote_filterscript,
    },
];

/// The handler registered for `scheme`.
#[must_use]
pub fn handler(scheme: UrlScheme) -> Option<&'static SchemeHandler> {
    HANDLERS.iter().find(|h| h.scheme == scheme)
}

fn local_binary(_project_dir: &Path, _path: &str) -> Result<Contribution> {
    Ok(Contribution::Plugin)
}

fn remote_binary(_project_dir: &Path, _remote: &GitDependency) -> Contribution {
    Contribution::Plugin
}

fn local_includes(project_dir: &Path, path: &str) -> Result<Contribution> {
    Ok(Contribution::IncludePath(project_dir.join(path)))
}

fn remote_includes(project_dir: &Path, remote: &GitDependency) -> Contribution {
    let mut include = project_dir.join(VENDOR_DIR).join(&remote.repo);
    if let Some(path) = &remote.path {
        include.push(path);
    }
    Contribution::IncludePath(include)
}

fn local_filterscript(project_dir: &Path, path: &str) -> Result<Contribution> {
    let full = project_dir.join(path);
    if !full.exists() {
        bail!("local filterscript path does not exist: {}", full.display());
    }
    Ok(Contribution::Nothing)
}

fn remote_filterscript(_project_dir: &Path, _remote: &GitDependency) -> Contribution {
    Contribution::Nothing
}
