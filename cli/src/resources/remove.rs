//! Path removal resource.
use std::path::PathBuf;

use super::helpers::fs::{occupied, remove_any};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::error::ConfigureError;

/// Desired state: nothing at `path`.
#[derive(Debug, Clone)]
pub struct RemoveResource {
    /// Path to remove.
    pub path: PathBuf,
}

impl RemoveResource {
    /// Create a new removal resource.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Applicable for RemoveResource {
    fn description(&self) -> String {
        format!("remove {}", self.path.display())
    }

    fn apply(&self) -> Result<ResourceChange, ConfigureError> {
        if !occupied(&self.path) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        remove_any(&self.path)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for RemoveResource {
    fn current_state(&self) -> Result<ResourceState, ConfigureError> {
        if occupied(&self.path) {
            Ok(ResourceState::Incorrect {
                current: "present".to_string(),
            })
        } else {
            Ok(ResourceState::Correct)
        }
    }
}
