//! URL-scheme prefixes that mark specially-typed dependencies.

use std::fmt;
use std::str::FromStr;

use crate::core::PawnpmError;

/// Scheme prefix of a URL-scheme dependency such as `plugin://local/plugins/streamer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UrlScheme {
    /// Server plugin binary (`plugin://`)
    Plugin,
    /// Extra include directory (`includes://`)
    Includes,
    /// Filterscript source (`filterscript://`)
    Filterscript,
    /// open.mp component binary (`component://`)
    Component,
}

impl UrlScheme {
    /// Every supported scheme, in the order they are documented.
    pub const ALL: [UrlScheme; 4] =
        [UrlScheme::Plugin, UrlScheme::Includes, UrlScheme::Filterscript, UrlScheme::Component];

    /// The scheme name as written before `://`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            UrlScheme::Plugin => "plugin",
            UrlScheme::Includes => "includes",
            UrlScheme::Filterscript => "filterscript",
            UrlScheme::Component => "component",
        }
    }

    /// Plugins and components both end up in the plugin list of the graph.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, UrlScheme::Plugin | UrlScheme::Component)
    }
}

impl fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlScheme {
    type Err = PawnpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UrlScheme::ALL.into_iter().find(|scheme| scheme.as_str() == s).ok_or_else(|| {
            PawnpmError::InvalidDependency {
                name: s.to_string(),
                reason: format!("unsupported dependency scheme: {s}"),
            }
        })
    }
}
