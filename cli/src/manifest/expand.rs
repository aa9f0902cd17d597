//! Engine paths and `${variable}` expansion of manifest path strings.
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ManifestError;

/// `${name}` references inside a manifest string.
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{([^}]*)\}").expect("variable pattern is valid")
});

/// Directories every path in the manifest is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    /// Repository root containing the manifest and dotfile sources.
    pub root: PathBuf,
    /// The user's home directory.
    pub home: PathBuf,
    /// Private, engine-owned override directory.
    pub local: PathBuf,
}

impl EnginePaths {
    /// Create paths, defaulting `local` to `<home>/.dotfiles.local`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>, local: Option<PathBuf>) -> Self {
        let home = home.into();
        let local = local.unwrap_or_else(|| home.join(".dotfiles.local"));
        Self {
            root: root.into(),
            home,
            local,
        }
    }

    /// Replace every `${home}`, `${local}` and `${root}` in `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnknownVariable`] for any other variable.
    pub fn expand(&self, value: &str) -> Result<String, ManifestError> {
        if let Some(unknown) = VARIABLE
            .captures_iter(value)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|name| self.lookup(name).is_none())
        {
            return Err(ManifestError::UnknownVariable {
                variable: unknown.to_string(),
                value: value.to_string(),
            });
        }
        Ok(VARIABLE
            .replace_all(value, |caps: &regex::Captures<'_>| {
                caps.get(1)
                    .and_then(|m| self.lookup(m.as_str()))
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .into_owned())
    }

    fn lookup(&self, name: &str) -> Option<&Path> {
        match name {
            "home" => Some(&self.home),
            "local" => Some(&self.local),
            "root" => Some(&self.root),
            _ => None,
        }
    }

    /// Expand `value` and make it absolute against `base`.
    ///
    /// A leading `~/` is relative to home regardless of `base`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown variables.
    pub fn resolve(&self, value: &str, base: &Path) -> Result<PathBuf, ManifestError> {
        let expanded = self.expand(value)?;
        if let Some(rest) = expanded.strip_prefix("~/") {
            return Ok(self.home.join(rest));
        }
        let path = PathBuf::from(expanded);
        Ok(if path.is_absolute() {
            path
        } else {
            base.join(path)
        })
    }

    /// Resolve a source path (symlink source, template, script) against root.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown variables.
    pub fn source(&self, value: &str) -> Result<PathBuf, ManifestError> {
        self.resolve(value, &self.root)
    }

    /// Resolve a destination path against home.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown variables.
    pub fn in_home(&self, value: &str) -> Result<PathBuf, ManifestError> {
        self.resolve(value, &self.home)
    }

    /// Resolve a path against the local override directory.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown variables.
    pub fn in_local(&self, value: &str) -> Result<PathBuf, ManifestError> {
        self.resolve(value, &self.local)
    }

    /// Whether `path` lies inside the local override directory.
    #[must_use]
    pub fn is_local(&self, path: &Path) -> bool {
        path.starts_with(&self.local)
    }
}
