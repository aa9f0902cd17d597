//! Empty-file resource.
use std::fs::OpenOptions;
use std::path::PathBuf;

use super::helpers::fs::{ensure_parent_dir, io_error, occupied};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::error::ConfigureError;

/// Desired state: a file exists at `path`.  Existing content is never
/// modified.
#[derive(Debug, Clone)]
pub struct TouchResource {
    /// File to create.
    pub path: PathBuf,
}

impl TouchResource {
    /// Create a new touch resource.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Applicable for TouchResource {
    fn description(&self) -> String {
        format!("touch {}", self.path.display())
    }

    fn apply(&self) -> Result<ResourceChange, ConfigureError> {
        if occupied(&self.path) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        ensure_parent_dir(&self.path)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(io_error("create", &self.path))?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for TouchResource {
    fn current_state(&self) -> Result<ResourceState, ConfigureError> {
        Ok(if occupied(&self.path) {
            ResourceState::Correct
        } else {
            ResourceState::Missing
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn creates_empty_file_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local/.zshrc.local");
        let res = TouchResource::new(path.clone());
        assert_eq!(res.current_state().unwrap(), ResourceState::Missing);
        assert_eq!(res.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn existing_content_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.el");
        fs::write(&path, "(setq x 1)").unwrap();
        let res = TouchResource::new(path.clone());
        assert_eq!(res.apply().unwrap(), ResourceChange::AlreadyCorrect);
        assert_eq!(fs::read_to_string(&path).unwrap(), "(setq x 1)");
    }
}
