//! Domain-specific error types for the dotfile engine.
//!
//! Internal modules return typed errors while command handlers at the CLI
//! boundary convert them to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! EngineError
//! ├── Manifest(ManifestError)  : structural, aborts before any execution
//! ├── Check(CheckError)        : probe could not run; target treated as unsatisfied
//! ├── Install(InstallError)    : fatal for one target
//! └── Configure(ConfigureError): fatal for one target's configure step
//! ```
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The manifest is structurally invalid.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// A probe could not be executed.
    #[error("Check error: {0}")]
    Check(#[from] CheckError),

    /// An installer invocation failed.
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// A configure action failed.
    #[error("Configure error: {0}")]
    Configure(#[from] ConfigureError),
}

/// Structural manifest problems. Always fatal, reported before any target runs.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The required-dependency graph contains a cycle.
    #[error("dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// A required dependency names a target that does not exist.
    #[error("target '{target}' requires unknown target '{dependency}'")]
    UnknownDependency {
        /// Target declaring the dependency.
        target: String,
        /// Name of the missing target.
        dependency: String,
    },

    /// Two targets share an identifier.
    #[error("duplicate target identifier '{0}'")]
    DuplicateTarget(String),

    /// A target requested on the command line does not exist.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// An option gate references an option the target does not declare.
    #[error("target '{target}' gates on undeclared option '{option}'")]
    UndeclaredOption {
        /// Target containing the gate.
        target: String,
        /// Option name used by the gate.
        option: String,
    },

    /// A manifest entry is malformed.
    #[error("invalid entry in target '{target}': {message}")]
    InvalidEntry {
        /// Target containing the entry.
        target: String,
        /// What is wrong with it.
        message: String,
    },

    /// A path string references an unknown `${variable}`.
    #[error("unknown variable '${{{variable}}}' in '{value}'")]
    UnknownVariable {
        /// Variable name without the `${}` wrapper.
        variable: String,
        /// The full string containing it.
        value: String,
    },

    /// The manifest file could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Manifest path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// Manifest path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A probe could not even execute. Treated as "not satisfied".
#[derive(Error, Debug)]
pub enum CheckError {
    /// The probe program could not be spawned.
    #[error("could not run '{program}': {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error message.
        message: String,
    },

    /// The interpreter needed by a check script is not installed.
    #[error("interpreter '{0}' not found for check script")]
    MissingInterpreter(String),

    /// A check script does not exist.
    #[error("check script not found: {}", .0.display())]
    MissingScript(PathBuf),

    /// A path could not be moved aside (or restored) around a probe.
    #[error("could not relocate {}: {source}", path.display())]
    Relocate {
        /// Path being relocated.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A `skip_prefix` pattern is not a valid regular expression.
    #[error("invalid skip pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Regex compiler message.
        message: String,
    },
}

/// An installer invocation failed. Fatal for the target.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The installer exited non-zero.
    #[error("{installer} failed for '{subject}' (exit {code}): {stderr}")]
    Failed {
        /// Installer name (`brew`, `pacman`, `script`, …).
        installer: String,
        /// Package, script or path being installed.
        subject: String,
        /// Exit code, `-1` when terminated by a signal.
        code: i32,
        /// Captured standard error (trimmed).
        stderr: String,
    },

    /// The installer could not be started.
    #[error("could not run {installer}: {message}")]
    Spawn {
        /// Installer name.
        installer: String,
        /// Underlying error message.
        message: String,
    },

    /// No install strategy applies on the detected platform.
    #[error("no install strategy for '{target}' on {platform}")]
    Inapplicable {
        /// Target being installed.
        target: String,
        /// Detected platform description.
        platform: String,
    },

    /// The installer tool itself is not available.
    #[error("{installer} is not available on PATH")]
    Unavailable {
        /// Installer name.
        installer: String,
    },

    /// A post-install check script did not pass.
    #[error("post-install check {} still fails", .0.display())]
    CheckStillFails(PathBuf),

    /// An install-time filesystem step failed.
    #[error("install step failed: {0}")]
    Filesystem(String),

    /// The run was cancelled while the installer was running.
    #[error("cancelled")]
    Cancelled,
}

/// A configure action failed. Prior successful actions of the target stand.
#[derive(Error, Debug)]
pub enum ConfigureError {
    /// The destination exists and is not the expected managed artifact.
    #[error("refusing to overwrite {}: {reason}", path.display())]
    Conflict {
        /// Conflicting destination.
        path: PathBuf,
        /// What currently occupies it.
        reason: String,
    },

    /// A symlink source does not exist.
    #[error("symlink source does not exist: {}", .0.display())]
    MissingSource(PathBuf),

    /// The template collaborator failed.
    #[error("failed to render {}: {message}", template.display())]
    Template {
        /// Template path.
        template: PathBuf,
        /// Renderer message.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("{operation} {}: {source}", path.display())]
    Io {
        /// Short description of the operation.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // ManifestError
    // -----------------------------------------------------------------------

    #[test]
    fn manifest_error_cycle_display() {
        let e = ManifestError::DependencyCycle("a → b → a".to_string());
        assert_eq!(e.to_string(), "dependency cycle detected: a → b → a");
    }

    #[test]
    fn manifest_error_unknown_dependency_display() {
        let e = ManifestError::UnknownDependency {
            target: "alpha".to_string(),
            dependency: "beta".to_string(),
        };
        assert_eq!(e.to_string(), "target 'alpha' requires unknown target 'beta'");
    }

    #[test]
    fn manifest_error_unknown_variable_display() {
        let e = ManifestError::UnknownVariable {
            variable: "cache".to_string(),
            value: "${cache}/x".to_string(),
        };
        assert_eq!(e.to_string(), "unknown variable '${cache}' in '${cache}/x'");
    }

    #[test]
    fn manifest_error_io_has_source() {
        use std::error::Error as _;
        let e = ManifestError::Io {
            path: "dotfiles.toml".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("dotfiles.toml"));
    }

    // -----------------------------------------------------------------------
    // InstallError / ConfigureError
    // -----------------------------------------------------------------------

    #[test]
    fn install_error_failed_display() {
        let e = InstallError::Failed {
            installer: "pacman".to_string(),
            subject: "zsh".to_string(),
            code: 1,
            stderr: "target not found".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "pacman failed for 'zsh' (exit 1): target not found"
        );
    }

    #[test]
    fn install_error_inapplicable_display() {
        let e = InstallError::Inapplicable {
            target: "cmake".to_string(),
            platform: "arch_linux".to_string(),
        };
        assert_eq!(e.to_string(), "no install strategy for 'cmake' on arch_linux");
    }

    #[test]
    fn configure_conflict_display() {
        let e = ConfigureError::Conflict {
            path: PathBuf::from("/home/u/.zshrc"),
            reason: "a regular file exists".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "refusing to overwrite /home/u/.zshrc: a regular file exists"
        );
    }

    // -----------------------------------------------------------------------
    // EngineError conversions
    // -----------------------------------------------------------------------

    #[test]
    fn engine_error_from_manifest_error() {
        let e: EngineError = ManifestError::DuplicateTarget("git".to_string()).into();
        assert!(e.to_string().starts_with("Manifest error"));
        assert!(e.to_string().contains("git"));
    }

    #[test]
    fn engine_error_from_check_error() {
        let e: EngineError = CheckError::MissingInterpreter("zsh".to_string()).into();
        assert!(e.to_string().starts_with("Check error"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<EngineError>();
        assert_send_sync::<ManifestError>();
        assert_send_sync::<CheckError>();
        assert_send_sync::<InstallError>();
        assert_send_sync::<ConfigureError>();
    }

    #[test]
    fn install_error_converts_to_anyhow() {
        let _anyhow_err: anyhow::Error = InstallError::Cancelled.into();
    }
}
