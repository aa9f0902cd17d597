//! Subcommand orchestration.
pub mod check;
pub mod list;
pub mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::engine::Context;
use crate::exec::{Cancellation, SystemExecutor};
use crate::logging::Log;
use crate::manifest::loader::{self, MANIFEST_FILE};
use crate::manifest::validation;
use crate::manifest::{EnginePaths, Manifest};
use crate::platform::Platform;

/// Shared state produced by the common command setup sequence.
///
/// Resolves the engine paths and platform, then loads and validates the
/// manifest so that each command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Root, home and local directories.
    pub paths: EnginePaths,
    /// Detected or overridden platform.
    pub platform: Platform,
    /// The loaded manifest.
    pub manifest: Manifest,
}

impl CommandSetup {
    /// Resolve paths and platform and load the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or home directory cannot be determined,
    /// `--os` names an unknown platform, or the manifest is invalid.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        let root = resolve_root(global)?;
        let home = resolve_home(global)?;
        let paths = EnginePaths::new(root, home, global.local_dir.clone());
        let platform = match global.os.as_deref() {
            Some(name) => Platform::from_condition_name(name).map_err(anyhow::Error::msg)?,
            None => Platform::detect(),
        };
        log.debug(&format!("platform: {}", platform.describe()));

        let manifest_path = global
            .manifest
            .clone()
            .unwrap_or_else(|| paths.root.join(MANIFEST_FILE));
        log.stage("Loading manifest");
        let manifest = loader::load(&manifest_path, &paths)
            .with_context(|| format!("loading {}", manifest_path.display()))?;
        log.info(&format!(
            "loaded {} targets from {}",
            manifest.len(),
            manifest_path.display()
        ));

        let warnings = validation::warnings(&manifest, &paths);
        if !warnings.is_empty() {
            log.warn(&format!("found {} manifest warning(s):", warnings.len()));
            for warning in &warnings {
                log.warn(&format!("  {}: {}", warning.target, warning.message));
            }
        }

        Ok(Self {
            paths,
            platform,
            manifest,
        })
    }

    /// Build the run context for this setup.
    #[must_use]
    pub fn context(&self, global: &GlobalOpts, cancel: &Cancellation, log: Arc<dyn Log>) -> Context {
        let jobs = global.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        });
        Context::new(self.paths.clone(), self.platform.clone(), log)
            .with_executor(Arc::new(SystemExecutor::new(cancel.clone())))
            .with_cancellation(cancel.clone())
            .with_options(global.with.clone())
            .with_dry_run(global.dry_run)
            .with_jobs(jobs)
    }
}

/// Resolve the repository root from CLI arguments or auto-detection.
///
/// # Errors
///
/// Returns an error if no candidate directory contains the manifest.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(root) = &global.root {
        return Ok(root.clone());
    }

    if let Ok(root) = std::env::var("DOTFILE_ROOT") {
        return Ok(PathBuf::from(root));
    }

    let has_manifest = |dir: &Path| dir.join(MANIFEST_FILE).is_file();

    if let Ok(exe) = std::env::current_exe()
        && let Some(parent) = exe.parent()
    {
        let candidates = [
            parent.join("../../.."), // cli/target/release/ -> repo root
            parent.join(".."),       // bin/ -> repo root
        ];
        for candidate in &candidates {
            if has_manifest(candidate) {
                return Ok(dunce::canonicalize(candidate)?);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    if has_manifest(&cwd) || global.manifest.is_some() {
        return Ok(cwd);
    }

    anyhow::bail!(
        "cannot determine repository root (no {MANIFEST_FILE} found). Use --root or set DOTFILE_ROOT"
    );
}

/// Resolve the home directory from `--home`, `HOME` or `USERPROFILE`.
///
/// # Errors
///
/// Returns an error if none is set.
pub fn resolve_home(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(home) = &global.home {
        return Ok(home.clone());
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .context("cannot determine home directory. Use --home or set HOME")
}
