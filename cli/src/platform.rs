//! Host environment detection and OS conditions.
//!
//! The engine detects the running platform once per run and threads the
//! resulting [`Platform`] through every component.  OS-gated manifest blocks
//! are keyed by [`OsCondition`] and evaluated lazily against that value, so
//! the same manifest can be evaluated against a different (overridden)
//! platform without modification.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    /// Apple macOS.
    MacOs,
    /// Any Linux distribution.
    Linux,
    /// Microsoft Windows.
    Windows,
    /// Detection was ambiguous; no OS condition matches.
    Unknown,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A predicate over the detected platform, used to gate manifest blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsCondition {
    /// Matches macOS.
    #[serde(rename = "macos")]
    MacOs,
    /// Matches any Linux distribution.
    Linux,
    /// Matches Arch Linux and distributions declaring `ID_LIKE=arch`.
    ArchLinux,
    /// Matches Windows.
    Windows,
}

impl OsCondition {
    /// All conditions, in declaration order.
    pub const ALL: [Self; 4] = [Self::MacOs, Self::Linux, Self::ArchLinux, Self::Windows];

    /// How narrowly the condition describes a host.
    ///
    /// When several variants of a lifecycle step match, the most specific
    /// one is selected (`arch_linux` over `linux`).
    #[must_use]
    pub const fn specificity(self) -> u8 {
        match self {
            Self::ArchLinux => 2,
            Self::MacOs | Self::Linux | Self::Windows => 1,
        }
    }

    /// Manifest spelling of the condition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::ArchLinux => "arch_linux",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for OsCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                format!("unknown OS condition '{s}' (expected macos, linux, arch_linux or windows)")
            })
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Linux distribution identifiers (`ID` followed by `ID_LIKE` entries).
    pub distro: Vec<String>,
}

impl Platform {
    /// Detect the current platform.
    ///
    /// Side-effect free: reads `/etc/os-release` on Linux and nothing else.
    #[must_use]
    pub fn detect() -> Self {
        let os = Self::detect_os();
        let distro = if os == Os::Linux {
            Self::detect_distro(Path::new("/etc/os-release"), Path::new("/etc/arch-release"))
        } else {
            Vec::new()
        };
        Self { os, distro }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(os: Os, distro: &[&str]) -> Self {
        Self {
            os,
            distro: distro.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    /// Build a platform that satisfies exactly the given condition name.
    ///
    /// Used by `--os` to evaluate a manifest against another environment.
    /// `"unknown"` yields a platform on which no condition matches.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a known condition or `"unknown"`.
    pub fn from_condition_name(name: &str) -> Result<Self, String> {
        if name == "unknown" {
            return Ok(Self::new(Os::Unknown, &[]));
        }
        Ok(match name.parse::<OsCondition>()? {
            OsCondition::MacOs => Self::new(Os::MacOs, &[]),
            OsCondition::Linux => Self::new(Os::Linux, &[]),
            OsCondition::ArchLinux => Self::new(Os::Linux, &["arch"]),
            OsCondition::Windows => Self::new(Os::Windows, &[]),
        })
    }

    /// Whether `condition` holds on this platform.
    #[must_use]
    pub fn matches(&self, condition: OsCondition) -> bool {
        match condition {
            OsCondition::MacOs => self.os == Os::MacOs,
            OsCondition::Linux => self.os == Os::Linux,
            OsCondition::ArchLinux => self.os == Os::Linux && self.distro.iter().any(|d| d == "arch"),
            OsCondition::Windows => self.os == Os::Windows,
        }
    }

    /// The most specific condition satisfied by this platform, if any.
    #[must_use]
    pub fn primary_condition(&self) -> Option<OsCondition> {
        OsCondition::ALL
            .into_iter()
            .filter(|c| self.matches(*c))
            .max_by_key(|c| c.specificity())
    }

    /// Short human-readable description (`arch_linux`, `macos`, `unknown`).
    #[must_use]
    pub fn describe(&self) -> String {
        self.primary_condition()
            .map_or_else(|| self.os.to_string(), |c| c.to_string())
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Unknown
        }
    }

    fn detect_distro(os_release: &Path, arch_release: &Path) -> Vec<String> {
        let mut ids = std::fs::read_to_string(os_release)
            .map(|content| parse_os_release(&content))
            .unwrap_or_default();
        if ids.is_empty() && arch_release.exists() {
            ids.push("arch".to_string());
        }
        ids
    }
}

/// Extract `ID` and `ID_LIKE` values from `os-release` content.
fn parse_os_release(content: &str) -> Vec<String> {
    let mut id = Vec::new();
    let mut like = Vec::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        match key.trim() {
            "ID" => id.push(value.to_lowercase()),
            "ID_LIKE" => like.extend(value.split_whitespace().map(str::to_lowercase)),
            _ => {}
        }
    }
    id.extend(like);
    id
}
