use regex::Regex;
use std::sync::LazyLock;

use super::{Constraint, Dependency, GitDependency, UrlScheme};
use crate::constants::DEFAULT_SITE;
use crate::core::PawnpmError;
use crate::overrides::OverrideTable;

static URL_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(plugin|includes|filterscript|component)://(.+)$").expect("valid scheme pattern")
});

static GENERIC_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://([^/]*)(/.*)?$").expect("valid url pattern")
});

static GIT_SSH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-zA-Z][a-zA-Z0-9_]+)@((?:[a-zA-Z][a-zA-Z0-9\-]*\.)*[a-zA-Z][a-zA-Z0-9\-]*):((?:[A-Za-z0-9_\-.]+/?)*)$",
    )
    .expect("valid ssh pattern")
});

static DEPENDENCY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/?([a-zA-Z0-9\-]+)/([a-zA-Z0-9\-._]+)/?([a-zA-Z0-9\-_$\[\]{}().,/]*)([@:#])?(.+)?$",
    )
    .expect("valid dependency pattern")
});

const COMMIT_LENGTH: usize = 40;

/// Rewrites `raw` through the override table, then parses the result.
///
/// All later stages see the redirected target, never the original string.
pub fn parse_with_overrides(raw: &str, overrides: &OverrideTable) -> Result<Dependency, PawnpmError> {
    let rewritten = overrides.rewrite(raw);
    parse_specifier(&rewritten)
}

/// Parses a dependency string without consulting overrides.
pub fn parse_specifier(raw: &str) -> Result<Dependency, PawnpmError> {
    let raw = raw.trim();
    let dependency = if let Some(captures) = URL_SCHEME.captures(raw) {
        let scheme: UrlScheme = captures[1].parse()?;
        let rest = &captures[2];
        match rest.strip_prefix("local/") {
            Some(path) => Dependency::LocalScheme {
                scheme,
                path: path.to_string(),
            },
            None => Dependency::RemoteScheme {
                scheme,
                remote: explode_path(rest, raw, DEFAULT_SITE)?,
            },
        }
    } else if let Some(captures) = GENERIC_URL.captures(raw) {
        let host = captures.get(1).map_or("", |m| m.as_str());
        let path = captures.get(2).map_or("", |m| m.as_str());
        let site = if host.is_empty() { DEFAULT_SITE } else { host };
        Dependency::Git(explode_path(path, raw, site)?)
    } else if let Some(captures) = GIT_SSH.captures(raw) {
        let mut git = explode_path(&captures[3], raw, &captures[2])?;
        git.ssh_user = Some(captures[1].to_string());
        Dependency::Git(git)
    } else {
        Dependency::Git(explode_bare(raw)?)
    };

    dependency.validate()?;
    Ok(dependency)
}

/// `owner/repo...`, optionally prefixed by a hosting site such as `gitlab.com/`.
fn explode_bare(raw: &str) -> Result<GitDependency, PawnpmError> {
    match raw.split_once('/') {
        Some((head, rest)) if head.contains('.') && !head.contains([':', '@', '#']) => {
            explode_path(rest, raw, head)
        }
        _ => explode_path(raw, raw, DEFAULT_SITE),
    }
}

fn explode_path(path: &str, raw: &str, site: &str) -> Result<GitDependency, PawnpmError> {
    let captures = DEPENDENCY_PATH.captures(path).ok_or_else(|| PawnpmError::InvalidSpecifier {
        specifier: raw.to_string(),
        reason: "dependency string does not match pattern".to_string(),
    })?;

    let group = |i: usize| captures.get(i).map_or("", |m| m.as_str());
    let (separator, version) = (group(4), group(5));

    let constraint = match (separator, version) {
        (_, "") => Constraint::None,
        (":", tag) => Constraint::Tag(tag.to_string()),
        ("@", branch) => Constraint::Branch(branch.to_string()),
        ("#", commit) if commit.len() == COMMIT_LENGTH => Constraint::Commit(commit.to_string()),
        ("#", commit) => return Err(PawnpmError::InvalidCommitLength { length: commit.len() }),
        _ => {
            return Err(PawnpmError::InvalidVersionSpecifier {
                specifier: raw.to_string(),
            });
        }
    };

    let sub_path = group(3).trim_end_matches('/');
    Ok(GitDependency {
        site: site.to_string(),
        owner: group(1).to_string(),
        repo: group(2).to_string(),
        path: (!sub_path.is_empty()).then(|| sub_path.to_string()),
        constraint,
        ssh_user: None,
    })
}
