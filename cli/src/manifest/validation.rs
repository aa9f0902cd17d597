//! Structural manifest validation.
//!
//! [`validate`] enforces the invariants that make a manifest unusable
//! (duplicate identifiers, dangling required edges, undeclared options).
//! [`warnings`] reports suspicious but runnable authoring choices.
use std::collections::HashSet;

use super::expand::EnginePaths;
use super::model::{ConfigureAction, Installer, Manifest, Probe, Requirement, Target};
use crate::error::ManifestError;

/// A validation warning detected during manifest loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The target that triggered the warning.
    pub target: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    #[must_use]
    fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Reject manifests that cannot be run at all.
///
/// Cycles are detected by the resolver, which reports the cycle path for the
/// targets actually requested.
///
/// # Errors
///
/// Returns the first [`ManifestError`] found, in declaration order.
pub fn validate(manifest: &Manifest) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for target in manifest.targets() {
        if !seen.insert(target.id.as_str()) {
            return Err(ManifestError::DuplicateTarget(target.id.clone()));
        }
    }

    for target in manifest.targets() {
        if let Some(dependency) = target
            .dependencies
            .iter()
            .find(|d| d.requirement == Requirement::Required && !manifest.contains(&d.target))
        {
            return Err(ManifestError::UnknownDependency {
                target: target.id.clone(),
                dependency: dependency.target.clone(),
            });
        }
        check_options(target)?;
    }
    Ok(())
}

fn check_options(target: &Target) -> Result<(), ManifestError> {
    let undeclared = target
        .install
        .iter_all()
        .filter_map(|step| step.gate.option())
        .find(|option| !target.options.iter().any(|o| o == option));
    match undeclared {
        Some(option) => Err(ManifestError::UndeclaredOption {
            target: target.id.clone(),
            option: option.to_string(),
        }),
        None => Ok(()),
    }
}

/// Non-fatal findings: missing source files, self-references, and install
/// steps without any probe to confirm them.
///
/// Sources inside the local directory are skipped; they are usually created
/// by earlier configure actions of the same run.
#[must_use]
pub fn warnings(manifest: &Manifest, paths: &EnginePaths) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for target in manifest.targets() {
        if !target.install.is_empty() && target.check.is_empty() {
            warnings.push(ValidationWarning::new(
                &target.id,
                "install steps declared without a check; the target is always satisfied",
            ));
        }

        for dependency in &target.dependencies {
            if dependency.target == target.id {
                warnings.push(ValidationWarning::new(&target.id, "target depends on itself"));
            }
        }

        for action in target.configure.iter_all() {
            match action {
                ConfigureAction::Symlink { source, .. }
                    if !paths.is_local(source) && !source.exists() =>
                {
                    warnings.push(ValidationWarning::new(
                        &target.id,
                        format!("symlink source does not exist: {}", source.display()),
                    ));
                }
                ConfigureAction::Template { template, .. } if !template.exists() => {
                    warnings.push(ValidationWarning::new(
                        &target.id,
                        format!("template does not exist: {}", template.display()),
                    ));
                }
                _ => {}
            }
        }

        for step in target.install.iter_all() {
            if let Installer::Script { run, .. } = &step.installer
                && !run.exists()
            {
                warnings.push(ValidationWarning::new(
                    &target.id,
                    format!("install script does not exist: {}", run.display()),
                ));
            }
        }

        for probe in target.check.iter_all() {
            if let Probe::Script { path, .. } = probe
                && !path.exists()
            {
                warnings.push(ValidationWarning::new(
                    &target.id,
                    format!("check script does not exist: {}", path.display()),
                ));
            }
        }
    }

    warnings
}
