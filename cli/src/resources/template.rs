//! Template rendering resource.
//!
//! Templates seed user-editable local files: a destination that exists is
//! never touched again, whatever its content.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::helpers::fs::{ensure_parent_dir, io_error, occupied};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::error::ConfigureError;
use crate::platform::OsCondition;

/// `${name}` placeholders.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{(\w+)\}").expect("placeholder pattern is valid")
});

/// Values available to templates, keyed by placeholder name.
pub type TemplateVars = BTreeMap<String, String>;

/// The templating collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` into a new file at `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigureError`] if the template cannot be read or the
    /// destination cannot be written.
    fn render(
        &self,
        template: &Path,
        destination: &Path,
        vars: &TemplateVars,
    ) -> Result<(), ConfigureError>;
}

/// Substitutes `${name}` placeholders from the variable map.
///
/// Placeholders without a value are left verbatim, so shell syntax such as
/// `${PATH}` in a template survives rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl DefaultRenderer {
    /// Substitute placeholders in `text`.
    #[must_use]
    pub fn substitute(text: &str, vars: &TemplateVars) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &regex::Captures<'_>| {
                caps.get(1)
                    .and_then(|name| vars.get(name.as_str()))
                    .cloned()
                    .unwrap_or_else(|| caps.get(0).map_or("", |m| m.as_str()).to_string())
            })
            .into_owned()
    }
}

impl TemplateRenderer for DefaultRenderer {
    fn render(
        &self,
        template: &Path,
        destination: &Path,
        vars: &TemplateVars,
    ) -> Result<(), ConfigureError> {
        let text = fs::read_to_string(template).map_err(|e| ConfigureError::Template {
            template: template.to_path_buf(),
            message: e.to_string(),
        })?;
        ensure_parent_dir(destination)?;
        fs::write(destination, Self::substitute(&text, vars))
            .map_err(io_error("write", destination))
    }
}

/// A file rendered from a template once.
pub struct TemplateResource<'a> {
    /// Template path.
    pub template: PathBuf,
    /// Rendered file.
    pub destination: PathBuf,
    condition: Option<OsCondition>,
    vars: &'a TemplateVars,
    renderer: &'a dyn TemplateRenderer,
}

impl std::fmt::Debug for TemplateResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResource")
            .field("template", &self.template)
            .field("destination", &self.destination)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

impl<'a> TemplateResource<'a> {
    /// Create a template resource rendered with `renderer`.
    ///
    /// `condition` is the OS condition selected for the run; a sibling
    /// `<template>.<condition>` is preferred when it exists.
    #[must_use]
    pub const fn new(
        template: PathBuf,
        destination: PathBuf,
        condition: Option<OsCondition>,
        vars: &'a TemplateVars,
        renderer: &'a dyn TemplateRenderer,
    ) -> Self {
        Self {
            template,
            destination,
            condition,
            vars,
            renderer,
        }
    }

    /// The template file that will actually be rendered.
    #[must_use]
    pub fn effective_template(&self) -> PathBuf {
        self.condition
            .map(|c| {
                PathBuf::from(format!(
                    "{}.{}",
                    self.template.as_os_str().to_string_lossy(),
                    c.as_str()
                ))
            })
            .filter(|variant| variant.is_file())
            .unwrap_or_else(|| self.template.clone())
    }
}

impl Applicable for TemplateResource<'_> {
    fn description(&self) -> String {
        format!(
            "render {} -> {}",
            self.effective_template().display(),
            self.destination.display()
        )
    }

    fn apply(&self) -> Result<ResourceChange, ConfigureError> {
        if occupied(&self.destination) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        let template = self.effective_template();
        if !template.is_file() {
            return Err(ConfigureError::Template {
                template,
                message: "template not found".to_string(),
            });
        }
        self.renderer.render(&template, &self.destination, self.vars)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for TemplateResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ConfigureError> {
        if occupied(&self.destination) {
            return Ok(ResourceState::Correct);
        }
        let template = self.effective_template();
        if template.is_file() {
            Ok(ResourceState::Missing)
        } else {
            Ok(ResourceState::Invalid {
                reason: format!("template not found: {}", template.display()),
            })
        }
    }
}
