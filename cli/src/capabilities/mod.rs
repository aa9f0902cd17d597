//! Check and installer adapters.
//!
//! [`Capabilities`] dispatches a [`Probe`] or an [`Installer`] from the
//! manifest to the backend that evaluates or runs it.  OS selection has
//! already happened by the time an entry reaches here.
pub mod binary;
pub mod package;
pub mod relocate;
pub mod script;
pub mod version;

use crate::error::{CheckError, InstallError};
use crate::exec::{Executor, is_cancelled};
use crate::logging::Log;
use crate::manifest::{Installer, Probe};
use crate::resources::symlink::SymlinkResource;
use crate::resources::{Applicable as _, ResourceChange};

use binary::BinaryProbe;
use package::{Package, PackageManager};
use relocate::Relocation;
use script::{ScriptFault, run_script};
use version::Version;

/// Adapter front end bound to one executor.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities<'a> {
    executor: &'a dyn Executor,
}

impl<'a> Capabilities<'a> {
    /// Bind to `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }

    /// Evaluate all `probes`; they pass only if every one passes.
    ///
    /// Evaluation stops at the first failing probe.  An empty list passes.
    ///
    /// # Errors
    ///
    /// Returns the first [`CheckError`] raised by a probe.
    pub fn probe_all<'p>(
        &self,
        probes: impl IntoIterator<Item = &'p Probe>,
        minimum: Option<&Version>,
        log: &dyn Log,
    ) -> Result<bool, CheckError> {
        for probe in probes {
            if !self.probe(probe, minimum, log)? {
                log.debug(&format!("probe failed: {}", probe.describe()));
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate one probe.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckError`] if the probe cannot run at all.
    pub fn probe(
        &self,
        probe: &Probe,
        minimum: Option<&Version>,
        log: &dyn Log,
    ) -> Result<bool, CheckError> {
        match probe {
            Probe::Binary {
                name,
                version_arg,
                returns_nonzero,
                skip_prefix,
            } => BinaryProbe {
                name,
                version_arg,
                returns_nonzero: *returns_nonzero,
                skip_prefix: skip_prefix.as_deref(),
            }
            .evaluate(self.executor, minimum, log),
            Probe::Command { program, args } => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                let result = self.executor.run_unchecked(program, &args).map_err(|e| {
                    CheckError::Spawn {
                        program: program.clone(),
                        message: format!("{e:#}"),
                    }
                })?;
                Ok(result.success)
            }
            Probe::Script { path, interpreter } => {
                match run_script(self.executor, path, interpreter.as_deref()) {
                    Ok(result) => Ok(result.success),
                    Err(ScriptFault::MissingScript(path)) => Err(CheckError::MissingScript(path)),
                    Err(ScriptFault::MissingInterpreter(name)) => {
                        Err(CheckError::MissingInterpreter(name))
                    }
                    Err(ScriptFault::Spawn(e)) => Err(CheckError::Spawn {
                        program: path.display().to_string(),
                        message: format!("{e:#}"),
                    }),
                }
            }
            Probe::Relocated { path, probes } => {
                let guard = Relocation::move_aside(path)?;
                if guard.moved() {
                    log.debug(&format!("moved {} aside", path.display()));
                }
                let outcome = self.probe_all(probes, minimum, log);
                guard.restore()?;
                outcome
            }
        }
    }

    /// Run one installer.
    ///
    /// Returns captured hint text, if the installer printed any.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] if the installer is unavailable or fails.
    pub fn install(&self, installer: &Installer, log: &dyn Log) -> Result<Option<String>, InstallError> {
        match installer {
            Installer::Brew {
                formula,
                tap,
                flags,
            } => Package {
                tap: tap.as_deref(),
                flags,
                ..Package::new(formula, PackageManager::Brew)
            }
            .install(self.executor, log),
            Installer::Cask { cask } => {
                Package::new(cask, PackageManager::Cask).install(self.executor, log)
            }
            Installer::Pacman { package } => {
                Package::new(package, PackageManager::Pacman).install(self.executor, log)
            }
            Installer::Aur { package, helper } => {
                let manager = PackageManager::aur(self.executor, helper.as_deref())?;
                Package::new(package, manager).install(self.executor, log)
            }
            Installer::Script {
                check,
                run,
                interpreter,
            } => {
                let result = run_script(self.executor, run, interpreter.as_deref())
                    .map_err(|fault| script_fault(fault, run))?;
                if !result.success {
                    return Err(InstallError::Failed {
                        installer: "script".to_string(),
                        subject: run.display().to_string(),
                        code: result.code.unwrap_or(-1),
                        stderr: result.stderr.trim().to_string(),
                    });
                }
                if let Some(check) = check {
                    let passed = run_script(self.executor, check, interpreter.as_deref())
                        .map_err(|fault| script_fault(fault, check))?
                        .success;
                    if !passed {
                        return Err(InstallError::CheckStillFails(check.clone()));
                    }
                }
                Ok(None)
            }
            Installer::Symlink {
                source,
                destination,
            } => {
                let link = SymlinkResource::new(source.clone(), destination.clone(), true);
                match link.apply() {
                    Ok(ResourceChange::Applied) => log.debug(&format!("linked {}", link.description())),
                    Ok(ResourceChange::AlreadyCorrect) => {}
                    Err(e) => return Err(InstallError::Filesystem(e.to_string())),
                }
                Ok(None)
            }
        }
    }

    /// Whether a package installer reports its package installed.
    ///
    /// `None` for installers that are not package managers.
    #[must_use]
    pub fn is_installed(&self, installer: &Installer) -> Option<bool> {
        let package = match installer {
            Installer::Brew { formula, .. } => Package::new(formula, PackageManager::Brew),
            Installer::Cask { cask } => Package::new(cask, PackageManager::Cask),
            Installer::Pacman { package } | Installer::Aur { package, .. } => {
                Package::new(package, PackageManager::Pacman)
            }
            Installer::Script { .. } | Installer::Symlink { .. } => return None,
        };
        Some(package.is_installed(self.executor))
    }
}

fn script_fault(fault: ScriptFault, script: &std::path::Path) -> InstallError {
    match fault {
        ScriptFault::Spawn(e) if is_cancelled(&e) => InstallError::Cancelled,
        ScriptFault::Spawn(e) => InstallError::Spawn {
            installer: "script".to_string(),
            message: format!("{e:#}"),
        },
        ScriptFault::MissingScript(path) => InstallError::Spawn {
            installer: "script".to_string(),
            message: format!("script not found: {}", path.display()),
        },
        ScriptFault::MissingInterpreter(name) => InstallError::Spawn {
            installer: "script".to_string(),
            message: format!("interpreter '{name}' not found for {}", script.display()),
        },
    }
}
