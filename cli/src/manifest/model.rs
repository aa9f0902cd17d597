//! In-memory manifest model.
//!
//! Built once per run by the loader and never mutated afterwards; shared by
//! reference across scheduler workers.  All paths are already expanded and
//! absolute.
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::variants::OsVariants;
use crate::platform::{OsCondition, Platform};

/// How strongly a target depends on another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// Must reach a non-failed terminal state first; orders execution.
    #[default]
    Required,
    /// Pulled into the run when present; degradation is a warning.
    Recommended,
    /// Only run when requested; degradation is an informational notice.
    Optional,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Required => "required",
            Self::Recommended => "recommended",
            Self::Optional => "optional",
        })
    }
}

/// A dependency edge from the owning target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Identifier of the depended-upon target.
    pub target: String,
    /// Requirement level.
    pub requirement: Requirement,
    /// Only active on platforms matching this condition.
    pub os: Option<OsCondition>,
}

impl Dependency {
    /// Whether the edge applies on `platform`.
    #[must_use]
    pub fn is_active(&self, platform: &Platform) -> bool {
        self.os.is_none_or(|c| platform.matches(c))
    }
}

/// A single presence probe. A check passes when all its probes pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// A binary exists on `PATH` and reports a version.
    Binary {
        /// Program name.
        name: String,
        /// Argument printing the version.
        version_arg: String,
        /// A non-zero exit of the version command is not a failure.
        returns_nonzero: bool,
        /// Output lines matching this pattern are ignored.
        skip_prefix: Option<String>,
    },
    /// A command exits zero.
    Command {
        /// Program to run.
        program: String,
        /// Its arguments.
        args: Vec<String>,
    },
    /// A check script exits zero.
    Script {
        /// Script path.
        path: PathBuf,
        /// Explicit interpreter; otherwise shebang, then `sh`.
        interpreter: Option<String>,
    },
    /// Nested probes evaluated with `path` temporarily moved aside.
    Relocated {
        /// Path moved aside during evaluation.
        path: PathBuf,
        /// Probes evaluated meanwhile.
        probes: Vec<Self>,
    },
}

impl Probe {
    /// Short description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Binary { name, .. } => format!("binary {name}"),
            Self::Command { program, .. } => format!("command {program}"),
            Self::Script { path, .. } => format!("script {}", path.display()),
            Self::Relocated { path, probes } => format!(
                "{} with {} moved aside",
                probes
                    .iter()
                    .map(Self::describe)
                    .collect::<Vec<_>>()
                    .join(", "),
                path.display()
            ),
        }
    }
}

/// Gate on a target option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OptionGate {
    /// Not gated.
    #[default]
    Always,
    /// Only when the option is enabled.
    With(String),
    /// Only when the option is disabled.
    Without(String),
}

impl OptionGate {
    /// Whether the gated step applies given the enabled predicate.
    #[must_use]
    pub fn allows(&self, enabled: impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Always => true,
            Self::With(option) => enabled(option),
            Self::Without(option) => !enabled(option),
        }
    }

    /// The option name referenced, if any.
    #[must_use]
    pub fn option(&self) -> Option<&str> {
        match self {
            Self::Always => None,
            Self::With(option) | Self::Without(option) => Some(option),
        }
    }
}

/// An installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installer {
    /// `brew install`.
    Brew {
        /// Formula name.
        formula: String,
        /// Tap to add first.
        tap: Option<String>,
        /// Extra flags, each passed as `--<flag>`.
        flags: Vec<String>,
    },
    /// `brew install --cask`.
    Cask {
        /// Cask name.
        cask: String,
    },
    /// `pacman -S`.
    Pacman {
        /// Package name.
        package: String,
    },
    /// AUR helper install.
    Aur {
        /// Package name.
        package: String,
        /// Explicit helper; otherwise the first one found on `PATH`.
        helper: Option<String>,
    },
    /// Run an install script, then optionally re-run a check script.
    Script {
        /// Check script that must pass afterwards.
        check: Option<PathBuf>,
        /// Script performing the install.
        run: PathBuf,
        /// Explicit interpreter.
        interpreter: Option<String>,
    },
    /// Link a file as part of installation.
    Symlink {
        /// Link target.
        source: PathBuf,
        /// Link location.
        destination: PathBuf,
    },
}

impl Installer {
    /// Short description for logs and dry-run plans.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Brew { formula, tap, .. } => tap.as_ref().map_or_else(
                || format!("brew install {formula}"),
                |tap| format!("brew install {formula} (tap {tap})"),
            ),
            Self::Cask { cask } => format!("brew install --cask {cask}"),
            Self::Pacman { package } => format!("pacman -S {package}"),
            Self::Aur { package, .. } => format!("aur install {package}"),
            Self::Script { run, .. } => format!("script {}", run.display()),
            Self::Symlink {
                source,
                destination,
            } => format!("symlink {} -> {}", destination.display(), source.display()),
        }
    }
}

/// One install step: an installer plus its option gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    /// What to run.
    pub installer: Installer,
    /// When to run it.
    pub gate: OptionGate,
}

/// A filesystem configure action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureAction {
    /// Create `destination` as a symlink to `source`.
    Symlink {
        /// Link target.
        source: PathBuf,
        /// Link location.
        destination: PathBuf,
        /// May replace an existing destination (with backup).
        managed: bool,
    },
    /// Render `template` to `destination` if absent.
    Template {
        /// Template path.
        template: PathBuf,
        /// Rendered file.
        destination: PathBuf,
    },
    /// Remove `path` if present.
    Remove {
        /// Path to remove.
        path: PathBuf,
    },
    /// Create an empty file at `path` if absent.
    Touch {
        /// Path to create.
        path: PathBuf,
    },
}

/// A named unit of installation and configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    /// Unique identifier.
    pub id: String,
    /// One-line description.
    pub description: Option<String>,
    /// Project homepage.
    pub homepage: Option<String>,
    /// Minimum acceptable version for binary probes.
    pub min_version: Option<String>,
    /// Declared boolean options.
    pub options: Vec<String>,
    /// Platforms the target applies to; empty means all.
    pub platforms: Vec<OsCondition>,
    /// Enclosing target, for nested targets.
    pub parent: Option<String>,
    /// Directly nested targets.
    pub children: Vec<String>,
    /// Presence probes.
    pub check: OsVariants<Probe>,
    /// Installer steps.
    pub install: OsVariants<InstallStep>,
    /// Configure actions.
    pub configure: OsVariants<ConfigureAction>,
    /// Dependency edges.
    pub dependencies: Vec<Dependency>,
    /// Post-install guidance.
    pub hints: Option<String>,
}

impl Target {
    /// Create a bare target with only an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Whether the target applies on `platform` at all.
    #[must_use]
    pub fn applies_to(&self, platform: &Platform) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|c| platform.matches(*c))
    }

    /// Required dependencies active on `platform`.
    pub fn required_on<'a>(&'a self, platform: &'a Platform) -> impl Iterator<Item = &'a str> {
        self.dependencies
            .iter()
            .filter(move |d| d.requirement == Requirement::Required && d.is_active(platform))
            .map(|d| d.target.as_str())
    }

    /// Recommended and optional dependencies active on `platform`.
    pub fn soft_on<'a>(&'a self, platform: &'a Platform) -> impl Iterator<Item = &'a Dependency> {
        self.dependencies
            .iter()
            .filter(move |d| d.requirement != Requirement::Required && d.is_active(platform))
    }
}

/// The complete, immutable set of targets in declaration order.
///
/// Nested targets follow their parent.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl Manifest {
    /// Build a manifest from flattened targets.
    ///
    /// Identifier uniqueness is enforced by validation; on duplicates the
    /// first declaration is the one found by [`get`](Self::get).
    #[must_use]
    pub fn new(targets: Vec<Target>) -> Self {
        let mut index = HashMap::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            index.entry(target.id.clone()).or_insert(i);
        }
        Self { targets, index }
    }

    /// All targets in declaration order.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Look up a target by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Target> {
        self.index.get(id).and_then(|&i| self.targets.get(i))
    }

    /// Whether a target with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Declaration position of `id`.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the manifest has no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::platform::Os;

    fn dep(target: &str, requirement: Requirement, os: Option<OsCondition>) -> Dependency {
        Dependency {
            target: target.to_string(),
            requirement,
            os,
        }
    }

    #[test]
    fn os_gated_dependency_is_inactive_elsewhere() {
        let mut tmux = Target::new("tmux");
        tmux.dependencies = vec![
            dep("reattach", Requirement::Required, Some(OsCondition::MacOs)),
            dep("git", Requirement::Required, None),
        ];
        let arch = Platform::new(Os::Linux, &["arch"]);
        assert_eq!(tmux.required_on(&arch).collect::<Vec<_>>(), vec!["git"]);
        let mac = Platform::new(Os::MacOs, &[]);
        assert_eq!(
            tmux.required_on(&mac).collect::<Vec<_>>(),
            vec!["reattach", "git"]
        );
    }

    #[test]
    fn soft_dependencies_exclude_required() {
        let mut zsh = Target::new("zsh");
        zsh.dependencies = vec![
            dep("zplug", Requirement::Recommended, None),
            dep("git", Requirement::Optional, None),
            dep("core", Requirement::Required, None),
        ];
        let linux = Platform::new(Os::Linux, &[]);
        let soft: Vec<_> = zsh.soft_on(&linux).map(|d| d.target.as_str()).collect();
        assert_eq!(soft, vec!["zplug", "git"]);
    }

    #[test]
    fn platform_gate() {
        let mut coreutils = Target::new("coreutils");
        coreutils.platforms = vec![OsCondition::MacOs];
        assert!(coreutils.applies_to(&Platform::new(Os::MacOs, &[])));
        assert!(!coreutils.applies_to(&Platform::new(Os::Linux, &[])));
        assert!(Target::new("any").applies_to(&Platform::new(Os::Unknown, &[])));
    }

    #[test]
    fn option_gate_allows() {
        let enabled = |o: &str| o == "windowed";
        assert!(OptionGate::Always.allows(enabled));
        assert!(OptionGate::With("windowed".into()).allows(enabled));
        assert!(!OptionGate::Without("windowed".into()).allows(enabled));
        assert!(OptionGate::Without("other".into()).allows(enabled));
    }

    #[test]
    fn manifest_lookup_preserves_declaration_order() {
        let manifest = Manifest::new(vec![Target::new("b"), Target::new("a")]);
        assert_eq!(manifest.position("b"), Some(0));
        assert_eq!(manifest.get("a").unwrap().id, "a");
        assert!(!manifest.contains("c"));
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn requirement_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: Requirement,
        }
        let w: Wrapper = toml::from_str("level = \"recommended\"").unwrap();
        assert_eq!(w.level, Requirement::Recommended);
        assert_eq!(Requirement::Optional.to_string(), "optional");
    }

    #[test]
    fn probe_descriptions() {
        let probe = Probe::Relocated {
            path: PathBuf::from("/h/.lein/profiles.clj"),
            probes: vec![Probe::Binary {
                name: "lein".into(),
                version_arg: "--version".into(),
                returns_nonzero: false,
                skip_prefix: None,
            }],
        };
        assert_eq!(
            probe.describe(),
            "binary lein with /h/.lein/profiles.clj moved aside"
        );
    }
}
