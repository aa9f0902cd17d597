//! Temporarily move a path aside while probes run.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CheckError;
use crate::resources::helpers::fs::remove_path;

/// Suffix appended to a relocated path.
const ASIDE_SUFFIX: &str = "dotfile-aside";

/// Guard holding a relocated path.
///
/// The path is restored by [`restore`](Self::restore) or, failing that, on
/// drop.  A path that did not exist is not moved and nothing is restored.
#[derive(Debug)]
pub struct Relocation {
    original: PathBuf,
    aside: Option<PathBuf>,
}

impl Relocation {
    /// Move `path` to a free sibling name if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Relocate`] if the rename fails.
    pub fn move_aside(path: &Path) -> Result<Self, CheckError> {
        if fs::symlink_metadata(path).is_err() {
            return Ok(Self {
                original: path.to_path_buf(),
                aside: None,
            });
        }
        let aside = free_name(path);
        fs::rename(path, &aside).map_err(|source| CheckError::Relocate {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            original: path.to_path_buf(),
            aside: Some(aside),
        })
    }

    /// Whether anything was moved.
    #[must_use]
    pub const fn moved(&self) -> bool {
        self.aside.is_some()
    }

    /// Put the path back.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Relocate`] if the rename fails; the drop guard
    /// does not retry.
    pub fn restore(mut self) -> Result<(), CheckError> {
        self.put_back()
    }

    fn put_back(&mut self) -> Result<(), CheckError> {
        let Some(aside) = self.aside.take() else {
            return Ok(());
        };
        // Whatever the probe left behind loses to the user's file.
        remove_path(&self.original).map_err(|source| CheckError::Relocate {
            path: self.original.clone(),
            source,
        })?;
        fs::rename(&aside, &self.original).map_err(|source| CheckError::Relocate {
            path: self.original.clone(),
            source,
        })
    }
}

impl Drop for Relocation {
    fn drop(&mut self) {
        let _ = self.put_back();
    }
}

fn free_name(path: &Path) -> PathBuf {
    let base = path.as_os_str().to_string_lossy();
    let first = PathBuf::from(format!("{base}.{ASIDE_SUFFIX}"));
    if fs::symlink_metadata(&first).is_err() {
        return first;
    }
    (1..)
        .map(|n| PathBuf::from(format!("{base}.{ASIDE_SUFFIX}.{n}")))
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
        .unwrap_or(first)
}
