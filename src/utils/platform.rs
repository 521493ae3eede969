//! Platform detection and the target platforms packages can ship binaries for.
//!
//! Pawn packages distribute server plugins as `.dll` files for Windows and `.so` files for
//! Linux. The graph builder picks resources for one [`Platform`], which defaults to the host
//! and can be overridden on the command line to prepare a project for another server.

use std::fmt;
use std::str::FromStr;

use crate::core::PawnpmError;

/// Returns true when compiled for Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Name of the git executable for the host platform.
///
/// - **Windows**: `git.exe`
/// - **Unix-like**: `git`, resolved through PATH
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Returns true if `cmd` can be found on PATH.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Server platform that plugin binaries are selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
}

impl Platform {
    /// The platform this binary was built for; everything that is not Windows is `Linux`.
    #[must_use]
    pub const fn host() -> Self {
        if is_windows() {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }

    /// Shared-library extension of server plugins, including the dot.
    #[must_use]
    pub const fn binary_extension(self) -> &'static str {
        match self {
            Platform::Windows => ".dll",
            Platform::Linux => ".so",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PawnpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            other => Err(PawnpmError::ConfigError {
                message: format!("unknown platform '{other}', expected 'windows' or 'linux'"),
            }),
        }
    }
}
