//! Symlink resource.
use std::fs;
use std::path::{Path, PathBuf};

use super::helpers::fs::{back_up, ensure_parent_dir, io_error, occupied, remove_any};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::error::ConfigureError;

/// A symlink resource that can be checked and applied.
///
/// An unmanaged link never replaces anything.  A managed link replaces a
/// wrong symlink and moves a regular file aside to a `.bak` backup first.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// The source file/directory (what the symlink points to).
    pub source: PathBuf,
    /// Where the symlink is created.
    pub destination: PathBuf,
    /// Whether an existing destination may be replaced.
    pub managed: bool,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, destination: PathBuf, managed: bool) -> Self {
        Self {
            source,
            destination,
            managed,
        }
    }

    fn conflict(&self, reason: impl Into<String>) -> ConfigureError {
        ConfigureError::Conflict {
            path: self.destination.clone(),
            reason: reason.into(),
        }
    }
}

impl Applicable for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.destination.display(), self.source.display())
    }

    fn apply(&self) -> Result<ResourceChange, ConfigureError> {
        match self.current_state()? {
            ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { .. } => {
                return Err(ConfigureError::MissingSource(self.source.clone()));
            }
            ResourceState::Incorrect { current } => {
                if !self.managed {
                    return Err(self.conflict(current));
                }
                let meta = fs::symlink_metadata(&self.destination)
                    .map_err(io_error("inspect", &self.destination))?;
                if meta.file_type().is_symlink() {
                    remove_any(&self.destination)?;
                } else if meta.is_file() {
                    back_up(&self.destination)?;
                } else {
                    return Err(self.conflict(current));
                }
            }
            ResourceState::Missing => {}
        }

        ensure_parent_dir(&self.destination)?;
        create_symlink(&self.source, &self.destination)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for SymlinkResource {
    fn current_state(&self) -> Result<ResourceState, ConfigureError> {
        if !self.source.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }
        if !occupied(&self.destination) {
            return Ok(ResourceState::Missing);
        }

        match fs::read_link(&self.destination) {
            Ok(existing) if paths_equal(&existing, &self.source) => Ok(ResourceState::Correct),
            Ok(existing) => Ok(ResourceState::Incorrect {
                current: format!("symlink points to {}", existing.display()),
            }),
            Err(_) if self.destination.is_dir() => Ok(ResourceState::Incorrect {
                current: "a directory exists".to_string(),
            }),
            Err(_) => Ok(ResourceState::Incorrect {
                current: "a regular file exists".to_string(),
            }),
        }
    }
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
fn paths_equal(a: &Path, b: &Path) -> bool {
    dunce::simplified(a) == dunce::simplified(b)
}

/// Create a symlink at `link` pointing to `target`.
fn create_symlink(target: &Path, link: &Path) -> Result<(), ConfigureError> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);

    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };

    result.map_err(io_error("create symlink", link))
}
