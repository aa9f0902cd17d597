//! Package manager backends: Homebrew formulae and casks, pacman, AUR helpers.
use std::fmt;

use crate::error::InstallError;
use crate::exec::{ExecResult, Executor, is_cancelled};
use crate::logging::Log;

/// AUR helpers tried in order when none is configured.
const AUR_HELPERS: [&str; 3] = ["paru", "yay", "yaourt"];

/// A package manager front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageManager {
    /// Homebrew formulae.
    Brew,
    /// Homebrew casks.
    Cask,
    /// Official Arch Linux packages.
    Pacman,
    /// AUR packages through a helper binary.
    Aur(String),
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brew => f.write_str("brew"),
            Self::Cask => f.write_str("brew cask"),
            Self::Pacman => f.write_str("pacman"),
            Self::Aur(helper) => f.write_str(helper),
        }
    }
}

impl PackageManager {
    /// Binary that must be on `PATH`.
    fn tool(&self) -> &str {
        match self {
            Self::Brew | Self::Cask => "brew",
            Self::Pacman => "pacman",
            Self::Aur(helper) => helper,
        }
    }

    /// Resolve the AUR helper: the configured one, else the first found.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Unavailable`] if no helper is installed.
    pub fn aur(executor: &dyn Executor, helper: Option<&str>) -> Result<Self, InstallError> {
        if let Some(helper) = helper {
            return Ok(Self::Aur(helper.to_string()));
        }
        AUR_HELPERS
            .iter()
            .find(|h| executor.which(h))
            .map(|h| Self::Aur((*h).to_string()))
            .ok_or_else(|| InstallError::Unavailable {
                installer: AUR_HELPERS.join("/"),
            })
    }
}

/// A package to install with one manager.
#[derive(Debug)]
pub struct Package<'a> {
    /// Package, formula or cask name.
    pub name: &'a str,
    /// Manager used to install it.
    pub manager: PackageManager,
    /// Homebrew tap added before installing.
    pub tap: Option<&'a str>,
    /// Extra `--<flag>` arguments.
    pub flags: &'a [String],
}

impl<'a> Package<'a> {
    /// Package with no tap or flags.
    #[must_use]
    pub const fn new(name: &'a str, manager: PackageManager) -> Self {
        Self {
            name,
            manager,
            tap: None,
            flags: &[],
        }
    }

    /// Whether the package manager reports it installed.
    ///
    /// Missing tools and failing queries both answer `false`.
    #[must_use]
    pub fn is_installed(&self, executor: &dyn Executor) -> bool {
        if !executor.which(self.manager.tool()) {
            return false;
        }
        let result = match &self.manager {
            PackageManager::Brew => executor.run_unchecked("brew", &["list", "--versions", self.name]),
            PackageManager::Cask => {
                executor.run_unchecked("brew", &["list", "--cask", "--versions", self.name])
            }
            PackageManager::Pacman | PackageManager::Aur(_) => {
                executor.run_unchecked("pacman", &["-Q", self.name])
            }
        };
        result.is_ok_and(|r| r.success && !r.stdout.trim().is_empty())
    }

    /// Install the package.
    ///
    /// Returns Homebrew caveats, if any, as hint text.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] if the tool is missing or any command fails.
    pub fn install(&self, executor: &dyn Executor, log: &dyn Log) -> Result<Option<String>, InstallError> {
        let tool = self.manager.tool();
        if !executor.which(tool) {
            return Err(InstallError::Unavailable {
                installer: tool.to_string(),
            });
        }

        if let Some(tap) = self.tap {
            log.debug(&format!("brew tap {tap}"));
            self.invoke("brew", &["tap", tap], tap, executor)?;
        }

        let flags: Vec<String> = self.flags.iter().map(|f| format!("--{f}")).collect();
        let result = match &self.manager {
            PackageManager::Brew => {
                let mut args = vec!["install", self.name];
                args.extend(flags.iter().map(String::as_str));
                self.invoke("brew", &args, self.name, executor)?
            }
            PackageManager::Cask => {
                self.invoke("brew", &["install", "--cask", self.name], self.name, executor)?
            }
            PackageManager::Pacman => self.invoke(
                "sudo",
                &["pacman", "-S", "--needed", "--noconfirm", self.name],
                self.name,
                executor,
            )?,
            PackageManager::Aur(helper) => self.invoke(
                helper,
                &["-S", "--needed", "--noconfirm", self.name],
                self.name,
                executor,
            )?,
        };
        log.debug(&format!("{} installed {}", self.manager, self.name));
        Ok(caveats(&result.stdout))
    }

    fn invoke(
        &self,
        program: &str,
        args: &[&str],
        subject: &str,
        executor: &dyn Executor,
    ) -> Result<ExecResult, InstallError> {
        let result = executor.run_unchecked(program, args).map_err(|e| {
            if is_cancelled(&e) {
                InstallError::Cancelled
            } else {
                InstallError::Spawn {
                    installer: self.manager.to_string(),
                    message: format!("{e:#}"),
                }
            }
        })?;
        if result.success {
            Ok(result)
        } else {
            Err(InstallError::Failed {
                installer: self.manager.to_string(),
                subject: subject.to_string(),
                code: result.code.unwrap_or(-1),
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

/// Extract the body of a Homebrew `==> Caveats` section.
///
/// The section ends at the next `==>` header.
#[must_use]
pub fn caveats(stdout: &str) -> Option<String> {
    let mut lines = stdout.lines().skip_while(|l| l.trim() != "==> Caveats");
    lines.next()?;
    let body: Vec<&str> = lines.take_while(|l| !l.starts_with("==>")).collect();
    let text = body.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}
