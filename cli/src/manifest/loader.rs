//! TOML manifest front end.
//!
//! Deserialises the manifest file into raw structs and converts them into the
//! immutable [`Manifest`] model, expanding paths against [`EnginePaths`].
//!
//! ```toml
//! [[targets]]
//! name = "tmux"
//! min_version = "2.2"
//! check = [{ binary = "tmux", version_arg = "-V" }]
//! install = { macos = [{ brew = "tmux" }], arch_linux = [{ pacman = "tmux" }] }
//! configure = [{ symlink = ".tmux.conf" }]
//! dependencies = [{ target = "reattach-to-user-namespace", os = "macos" }]
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::expand::EnginePaths;
use super::model::{
    ConfigureAction, Dependency, InstallStep, Installer, Manifest, OptionGate, Probe, Requirement,
    Target,
};
use super::validation;
use super::variants::OsVariants;
use crate::capabilities::version::Version;
use crate::error::ManifestError;
use crate::platform::OsCondition;

/// Default manifest file name inside the repository root.
pub const MANIFEST_FILE: &str = "dotfiles.toml";

/// Default version argument for binary probes.
const DEFAULT_VERSION_ARG: &str = "--version";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    name: String,
    description: Option<String>,
    homepage: Option<String>,
    min_version: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    platforms: Vec<OsCondition>,
    #[serde(default)]
    check: Section<RawProbe>,
    #[serde(default)]
    install: Section<RawInstall>,
    #[serde(default)]
    configure: Section<RawConfigure>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    hints: Option<String>,
    #[serde(default)]
    children: Vec<Self>,
}

/// A lifecycle section: a plain list, or a table keyed by `all` and OS
/// condition names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Section<T> {
    List(Vec<T>),
    ByOs(BTreeMap<String, Vec<T>>),
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Name(String),
    Edge {
        target: String,
        #[serde(default)]
        level: Requirement,
        os: Option<OsCondition>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProbe {
    binary: Option<String>,
    version_arg: Option<String>,
    #[serde(default)]
    returns_nonzero: bool,
    skip_prefix: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    script: Option<String>,
    interpreter: Option<String>,
    relocate: Option<String>,
    #[serde(default)]
    probes: Vec<Self>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInstall {
    brew: Option<String>,
    tap: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    cask: Option<String>,
    pacman: Option<String>,
    aur: Option<String>,
    helper: Option<String>,
    script: Option<String>,
    check: Option<String>,
    interpreter: Option<String>,
    symlink: Option<String>,
    to: Option<String>,
    with_option: Option<String>,
    without_option: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigure {
    symlink: Option<String>,
    to: Option<String>,
    managed: Option<bool>,
    template: Option<String>,
    remove: Option<String>,
    touch: Option<String>,
}

/// Read, parse, convert and validate the manifest at `path`.
///
/// # Errors
///
/// Returns a [`ManifestError`] if the file cannot be read or parsed, or if
/// the resulting manifest is structurally invalid.
pub fn load(path: &Path, paths: &EnginePaths) -> Result<Manifest, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&content, &path.display().to_string(), paths)
}

/// Parse manifest `content`; `origin` names the source in error messages.
///
/// # Errors
///
/// Returns a [`ManifestError`] on syntax errors, malformed entries or
/// structural problems.
pub fn parse(content: &str, origin: &str, paths: &EnginePaths) -> Result<Manifest, ManifestError> {
    let raw: RawManifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
        path: origin.to_string(),
        message: e.message().to_string(),
    })?;

    let mut targets = Vec::new();
    for target in raw.targets {
        flatten(target, None, paths, &mut targets)?;
    }
    let manifest = Manifest::new(targets);
    validation::validate(&manifest)?;
    Ok(manifest)
}

/// Convert `raw` and its nested targets, parent first.
fn flatten(
    raw: RawTarget,
    parent: Option<&str>,
    paths: &EnginePaths,
    out: &mut Vec<Target>,
) -> Result<(), ManifestError> {
    let id = raw.name.trim().to_string();
    if id.is_empty() {
        return Err(ManifestError::InvalidEntry {
            target: parent.unwrap_or("<root>").to_string(),
            message: "target name is empty".to_string(),
        });
    }
    let convert = Converter { id: &id, paths };
    if let Some(min) = raw.min_version.as_deref()
        && Version::parse(min).is_none()
    {
        return Err(convert.invalid(format!("min_version '{min}' is not a version")));
    }

    let target = Target {
        description: raw.description,
        homepage: raw.homepage,
        min_version: raw.min_version,
        options: raw.options,
        platforms: raw.platforms,
        parent: parent.map(str::to_string),
        children: raw.children.iter().map(|c| c.name.trim().to_string()).collect(),
        check: convert.section(raw.check, |p| convert.probe(p))?,
        install: convert.section(raw.install, |i| convert.install(i))?,
        configure: convert.section(raw.configure, |c| convert.configure(c))?,
        dependencies: raw.dependencies.into_iter().map(RawDependency::into_model).collect(),
        hints: raw.hints.map(|h| h.trim_end().to_string()),
        id: id.clone(),
    };
    out.push(target);

    for child in raw.children {
        flatten(child, Some(&id), paths, out)?;
    }
    Ok(())
}

impl RawDependency {
    fn into_model(self) -> Dependency {
        match self {
            Self::Name(target) => Dependency {
                target,
                requirement: Requirement::Required,
                os: None,
            },
            Self::Edge { target, level, os } => Dependency {
                target,
                requirement: level,
                os,
            },
        }
    }
}

/// Per-target conversion state.
struct Converter<'a> {
    id: &'a str,
    paths: &'a EnginePaths,
}

impl Converter<'_> {
    fn invalid(&self, message: impl Into<String>) -> ManifestError {
        ManifestError::InvalidEntry {
            target: self.id.to_string(),
            message: message.into(),
        }
    }

    /// Exactly one of the kind keys must be present.
    fn one_kind(&self, section: &str, kinds: &[(&str, bool)]) -> Result<(), ManifestError> {
        let present: Vec<&str> = kinds.iter().filter(|(_, p)| *p).map(|(k, _)| *k).collect();
        match present.as_slice() {
            [_] => Ok(()),
            [] => Err(self.invalid(format!(
                "{section} entry needs one of: {}",
                kinds.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ")
            ))),
            many => Err(self.invalid(format!(
                "{section} entry mixes {}",
                many.join(" and ")
            ))),
        }
    }

    fn section<R, T>(
        &self,
        raw: Section<R>,
        convert: impl Fn(R) -> Result<T, ManifestError>,
    ) -> Result<OsVariants<T>, ManifestError> {
        let convert_all = |items: Vec<R>| items.into_iter().map(&convert).collect::<Result<Vec<_>, _>>();
        match raw {
            Section::List(items) => Ok(OsVariants::common(convert_all(items)?)),
            Section::ByOs(map) => {
                let mut variants = OsVariants::default();
                let mut common = Vec::new();
                for (key, items) in map {
                    let items = convert_all(items)?;
                    if key == "all" {
                        common.extend(items);
                    } else {
                        let condition = key.parse::<OsCondition>().map_err(|e| self.invalid(e))?;
                        variants = variants.with_variant(condition, items);
                    }
                }
                Ok(variants.with_common(common))
            }
        }
    }

    fn probe(&self, raw: RawProbe) -> Result<Probe, ManifestError> {
        self.one_kind(
            "check",
            &[
                ("binary", raw.binary.is_some()),
                ("command", raw.command.is_some()),
                ("script", raw.script.is_some()),
                ("relocate", raw.relocate.is_some()),
            ],
        )?;
        if let Some(name) = raw.binary {
            if let Some(pattern) = &raw.skip_prefix {
                regex::Regex::new(pattern).map_err(|e| {
                    self.invalid(format!("invalid skip_prefix '{pattern}': {e}"))
                })?;
            }
            return Ok(Probe::Binary {
                name,
                version_arg: raw
                    .version_arg
                    .unwrap_or_else(|| DEFAULT_VERSION_ARG.to_string()),
                returns_nonzero: raw.returns_nonzero,
                skip_prefix: raw.skip_prefix,
            });
        }
        if let Some(program) = raw.command {
            return Ok(Probe::Command {
                program: self.paths.expand(&program)?,
                args: raw.args,
            });
        }
        if let Some(script) = raw.script {
            return Ok(Probe::Script {
                path: self.paths.source(&script)?,
                interpreter: raw.interpreter,
            });
        }
        let path = raw.relocate.unwrap_or_default();
        if raw.probes.is_empty() {
            return Err(self.invalid(format!("relocate '{path}' has no probes")));
        }
        Ok(Probe::Relocated {
            path: self.paths.in_home(&path)?,
            probes: raw
                .probes
                .into_iter()
                .map(|p| self.probe(p))
                .collect::<Result<_, _>>()?,
        })
    }

    fn install(&self, raw: RawInstall) -> Result<InstallStep, ManifestError> {
        self.one_kind(
            "install",
            &[
                ("brew", raw.brew.is_some()),
                ("cask", raw.cask.is_some()),
                ("pacman", raw.pacman.is_some()),
                ("aur", raw.aur.is_some()),
                ("script", raw.script.is_some()),
                ("symlink", raw.symlink.is_some()),
            ],
        )?;
        let gate = match (raw.with_option, raw.without_option) {
            (None, None) => OptionGate::Always,
            (Some(option), None) => OptionGate::With(option),
            (None, Some(option)) => OptionGate::Without(option),
            (Some(_), Some(_)) => {
                return Err(self.invalid("install entry has both with_option and without_option"));
            }
        };
        if raw.brew.is_none() && (raw.tap.is_some() || !raw.flags.is_empty()) {
            return Err(self.invalid("tap and flags only apply to brew"));
        }
        if raw.aur.is_none() && raw.helper.is_some() {
            return Err(self.invalid("helper only applies to aur"));
        }
        if raw.script.is_none() && (raw.check.is_some() || raw.interpreter.is_some()) {
            return Err(self.invalid("check and interpreter only apply to script"));
        }
        if raw.symlink.is_none() && raw.to.is_some() {
            return Err(self.invalid("to only applies to symlink"));
        }

        let installer = if let Some(formula) = raw.brew {
            Installer::Brew {
                formula,
                tap: raw.tap,
                flags: raw.flags,
            }
        } else if let Some(cask) = raw.cask {
            Installer::Cask { cask }
        } else if let Some(package) = raw.pacman {
            Installer::Pacman { package }
        } else if let Some(package) = raw.aur {
            Installer::Aur {
                package,
                helper: raw.helper,
            }
        } else if let Some(run) = raw.script {
            Installer::Script {
                check: raw.check.map(|c| self.paths.source(&c)).transpose()?,
                run: self.paths.source(&run)?,
                interpreter: raw.interpreter,
            }
        } else {
            let source = raw.symlink.unwrap_or_default();
            let (source, destination) = self.link(&source, raw.to.as_deref())?;
            Installer::Symlink {
                source,
                destination,
            }
        };
        Ok(InstallStep { installer, gate })
    }

    fn configure(&self, raw: RawConfigure) -> Result<ConfigureAction, ManifestError> {
        self.one_kind(
            "configure",
            &[
                ("symlink", raw.symlink.is_some()),
                ("template", raw.template.is_some()),
                ("remove", raw.remove.is_some()),
                ("touch", raw.touch.is_some()),
            ],
        )?;
        if raw.managed.is_some() && raw.symlink.is_none() {
            return Err(self.invalid("managed only applies to symlink"));
        }
        if let Some(source) = raw.symlink {
            let (source, destination) = self.link(&source, raw.to.as_deref())?;
            let managed = raw
                .managed
                .unwrap_or_else(|| self.paths.is_local(&source));
            return Ok(ConfigureAction::Symlink {
                source,
                destination,
                managed,
            });
        }
        if let Some(template) = raw.template {
            let template = self.paths.source(&template)?;
            let destination = match raw.to.as_deref() {
                Some(to) => self.paths.in_home(to)?,
                None => self.paths.local.join(self.file_name(&template)?),
            };
            return Ok(ConfigureAction::Template {
                template,
                destination,
            });
        }
        if raw.to.is_some() {
            return Err(self.invalid("to only applies to symlink and template"));
        }
        if let Some(path) = raw.remove {
            return Ok(ConfigureAction::Remove {
                path: self.paths.in_home(&path)?,
            });
        }
        Ok(ConfigureAction::Touch {
            path: self.paths.in_local(&raw.touch.unwrap_or_default())?,
        })
    }

    /// Resolve a symlink source and its destination (default `<home>/<name>`).
    fn link(&self, source: &str, to: Option<&str>) -> Result<(PathBuf, PathBuf), ManifestError> {
        let source = self.paths.source(source)?;
        let destination = match to {
            Some(to) => self.paths.in_home(to)?,
            None => self.paths.home.join(self.file_name(&source)?),
        };
        Ok((source, destination))
    }

    fn file_name<'p>(&self, path: &'p Path) -> Result<&'p std::ffi::OsStr, ManifestError> {
        path.file_name()
            .ok_or_else(|| self.invalid(format!("{} has no file name", path.display())))
    }
}
