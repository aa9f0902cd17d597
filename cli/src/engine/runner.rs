//! Drives one target through check, install and configure.
use crate::capabilities::version::Version;
use crate::error::{CheckError, ConfigureError, InstallError};
use crate::logging::Log;
use crate::manifest::{InstallStep, Target};

use super::configure::configure;
use super::context::Context;
use super::lifecycle::{Lifecycle, State};
use super::report::{FailureKind, Outcome, RunResult};

/// A failure on the way to a terminal state.
struct Failure {
    kind: FailureKind,
    reason: String,
}

impl Failure {
    fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<InstallError> for Failure {
    fn from(e: InstallError) -> Self {
        match e {
            InstallError::Cancelled => Self::new(FailureKind::Cancelled, "cancelled"),
            other => Self::new(FailureKind::Install, other.to_string()),
        }
    }
}

impl From<ConfigureError> for Failure {
    fn from(e: ConfigureError) -> Self {
        let kind = if matches!(e, ConfigureError::Conflict { .. }) {
            FailureKind::ConfigureConflict
        } else {
            FailureKind::Configure
        };
        Self::new(kind, e.to_string())
    }
}

/// Install steps of `target` for this platform whose option gate is open.
fn applicable_steps<'t>(target: &'t Target, ctx: &Context) -> Vec<&'t InstallStep> {
    target
        .install
        .select(&ctx.platform)
        .into_iter()
        .filter(|step| step.gate.allows(|option| ctx.option_enabled(target, option)))
        .collect()
}

/// One target's run in progress.
struct Run<'a> {
    target: &'a Target,
    ctx: &'a Context,
    log: &'a dyn Log,
    lifecycle: Lifecycle<'a>,
    minimum: Option<Version>,
    hints: Vec<String>,
}

impl Run<'_> {
    fn to(&mut self, next: State) {
        if let Err(e) = self.lifecycle.advance(next, self.log) {
            self.log.error(&format!("{}: {e}", self.target.id));
        }
    }

    fn cancelled(&self) -> Result<(), Failure> {
        if self.ctx.cancel.is_cancelled() {
            Err(Failure::new(FailureKind::Cancelled, "cancelled"))
        } else {
            Ok(())
        }
    }

    /// A probe that cannot run counts as not satisfied.
    fn check(&self) -> Result<bool, Failure> {
        match evaluate_check(self.target, self.minimum.as_ref(), self.ctx, self.log) {
            Ok(passed) => Ok(passed),
            Err(e) => {
                self.cancelled()?;
                self.log.warn(&format!("{}: {e}", self.target.id));
                Ok(false)
            }
        }
    }

    fn install(&mut self) -> Result<(), Failure> {
        let steps = applicable_steps(self.target, self.ctx);
        if steps.is_empty() {
            return Err(InstallError::Inapplicable {
                target: self.target.id.clone(),
                platform: self.ctx.platform.describe(),
            }
            .into());
        }

        let caps = self.ctx.capabilities();
        if self.ctx.dry_run {
            for step in steps {
                let note = match caps.is_installed(&step.installer) {
                    Some(true) => " (already installed)",
                    Some(false) | None => "",
                };
                self.log
                    .dry_run(&format!("would {}{note}", step.installer.describe()));
            }
            return Ok(());
        }

        for step in steps {
            self.cancelled()?;
            self.log.info(&step.installer.describe());
            if let Some(hint) = caps.install(&step.installer, self.log)? {
                self.hints.push(hint);
            }
        }

        let verifiable = !self.target.check.select(&self.ctx.platform).is_empty();
        if verifiable && !self.check()? {
            return Err(Failure::new(
                FailureKind::Verification,
                "check still fails after installation",
            ));
        }
        Ok(())
    }

    fn drive(&mut self) -> Result<Outcome, Failure> {
        if !self.target.applies_to(&self.ctx.platform) {
            self.to(State::Skipped);
            return Ok(Outcome::Skipped {
                reason: format!("not applicable on {}", self.ctx.platform.describe()),
            });
        }
        self.cancelled()?;

        self.to(State::Checking);
        let satisfied = self.check()?;
        if satisfied {
            self.to(State::AlreadySatisfied);
        } else {
            self.to(State::Installing);
            self.install()?;
        }

        self.to(State::Configuring);
        let changed = configure(self.target, self.ctx, self.log)?;
        self.to(State::Done);

        Ok(match (satisfied, changed) {
            (true, false) => Outcome::AlreadySatisfied,
            _ if self.ctx.dry_run => Outcome::DryRun,
            (false, _) => Outcome::Installed,
            (true, true) => Outcome::Configured,
        })
    }
}

/// Evaluate the check of `target` selected for the run's platform.
///
/// An empty check passes unless it only declares variants for other
/// platforms.
///
/// # Errors
///
/// Returns the [`CheckError`] of a probe that could not run.
pub fn evaluate_check(
    target: &Target,
    minimum: Option<&Version>,
    ctx: &Context,
    log: &dyn Log,
) -> Result<bool, CheckError> {
    let probes = target.check.select(&ctx.platform);
    if probes.is_empty() {
        return Ok(!target.check.has_os_variants());
    }
    ctx.capabilities().probe_all(probes, minimum, log)
}

/// Run `target` to a terminal state.
///
/// Never returns an error: failures become [`Outcome::Failed`].  Declared
/// and installer hints are kept for every target that ran without failing.
#[must_use]
pub fn run_target(target: &Target, ctx: &Context, log: &dyn Log) -> RunResult {
    let mut run = Run {
        target,
        ctx,
        log,
        lifecycle: Lifecycle::new(&target.id),
        minimum: target.min_version.as_deref().and_then(Version::parse),
        hints: Vec::new(),
    };

    let outcome = match run.drive() {
        Ok(outcome) => outcome,
        Err(Failure { kind, reason }) => {
            run.to(State::Failed);
            log.error(&format!("{}: {reason}", target.id));
            Outcome::Failed { kind, reason }
        }
    };

    let mut hints = Vec::new();
    if !outcome.is_failed() && !matches!(outcome, Outcome::Skipped { .. }) {
        hints.extend(target.hints.as_deref().map(|h| h.trim().to_string()));
        hints.append(&mut run.hints);
    }
    RunResult {
        target: target.id.clone(),
        outcome,
        hints,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;
    use crate::exec::{ExecResult, Executor};
    use crate::logging::Level;
    use crate::logging::test_helpers::CaptureLog;
    use crate::manifest::{EnginePaths, Installer, OptionGate, OsVariants, Probe};
    use crate::platform::{Os, OsCondition, Platform};
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ctx(exec: Arc<MockExecutor>, os: Os) -> Context {
        Context::new(
            EnginePaths::new("/repo", "/home/u", None),
            Platform::new(os, &[]),
            Arc::new(CaptureLog::default()),
        )
        .with_executor(exec)
    }

    fn failure(outcome: Outcome) -> Option<(FailureKind, String)> {
        match outcome {
            Outcome::Failed { kind, reason } => Some((kind, reason)),
            _ => None,
        }
    }

    fn binary(name: &str) -> Probe {
        Probe::Binary {
            name: name.to_string(),
            version_arg: "--version".to_string(),
            returns_nonzero: false,
            skip_prefix: None,
        }
    }

    fn brew(formula: &str) -> InstallStep {
        InstallStep {
            installer: Installer::Brew {
                formula: formula.to_string(),
                tap: None,
                flags: vec![],
            },
            gate: OptionGate::Always,
        }
    }

    fn pacman(package: &str) -> InstallStep {
        InstallStep {
            installer: Installer::Pacman {
                package: package.to_string(),
            },
            gate: OptionGate::Always,
        }
    }

    fn tmux() -> Target {
        let mut t = Target::new("tmux");
        t.check = OsVariants::common(vec![binary("tmux")]);
        t.install = OsVariants::default()
            .with_variant(OsCondition::MacOs, vec![brew("tmux")])
            .with_variant(OsCondition::Linux, vec![pacman("tmux")]);
        t.hints = Some("Press C-a I to install plugins\n".to_string());
        t
    }

    /// Executor on whose `PATH` tmux appears once `brew install` ran.
    #[derive(Debug, Default)]
    struct InstallsTmux {
        installed: AtomicBool,
        inner: MockExecutor,
    }

    impl Executor for InstallsTmux {
        fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
            if program == "brew" && args.first() == Some(&"install") {
                self.installed.store(true, Ordering::SeqCst);
            }
            self.inner.run_unchecked(program, args)
        }

        fn run_in_unchecked(
            &self,
            _: &Path,
            program: &str,
            args: &[&str],
        ) -> anyhow::Result<ExecResult> {
            self.run_unchecked(program, args)
        }

        fn which(&self, program: &str) -> bool {
            program == "brew" || (program == "tmux" && self.installed.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn satisfied_check_skips_install() {
        let exec = Arc::new(
            MockExecutor::new()
                .with_which("tmux")
                .ok("tmux --version", "tmux 3.4"),
        );
        let ctx = ctx(Arc::clone(&exec), Os::MacOs);
        let log = CaptureLog::default();
        let result = run_target(&tmux(), &ctx, &log);
        assert_eq!(result.outcome, Outcome::AlreadySatisfied);
        assert_eq!(result.hints, vec!["Press C-a I to install plugins"]);
        assert_eq!(exec.count("brew"), 0);
        assert!(log.contains("tmux: checking -> already satisfied"));
    }

    #[test]
    fn installs_then_verifies() {
        let exec = Arc::new(InstallsTmux::default());
        let ctx = Context::new(
            EnginePaths::new("/repo", "/home/u", None),
            Platform::new(Os::MacOs, &[]),
            Arc::new(CaptureLog::default()),
        )
        .with_executor(exec);
        let result = run_target(&tmux(), &ctx, &CaptureLog::default());
        assert_eq!(result.outcome, Outcome::Installed);
        assert_eq!(result.hints, vec!["Press C-a I to install plugins"]);
    }

    #[test]
    fn check_still_failing_is_verification_failure() {
        let exec = Arc::new(MockExecutor::new().with_which("brew"));
        let ctx = ctx(Arc::clone(&exec), Os::MacOs);
        let result = run_target(&tmux(), &ctx, &CaptureLog::default());
        assert!(matches!(
            result.outcome,
            Outcome::Failed {
                kind: FailureKind::Verification,
                ..
            }
        ));
        assert_eq!(exec.count("brew install tmux"), 1);
        assert!(result.hints.is_empty());
    }

    #[test]
    fn installer_failure_is_install_failure() {
        let exec = Arc::new(
            MockExecutor::new()
                .with_which("pacman")
                .fail("sudo pacman -S", "target not found: tmux"),
        );
        let ctx = ctx(Arc::clone(&exec), Os::Linux);
        let log = CaptureLog::default();
        let result = run_target(&tmux(), &ctx, &log);
        let (kind, reason) = failure(result.outcome).unwrap();
        assert_eq!(kind, FailureKind::Install);
        assert!(reason.contains("target not found"));
        assert!(log.contains("tmux: installing -> failed"));
    }

    #[test]
    fn no_applicable_installer_is_inapplicable() {
        let exec = Arc::new(MockExecutor::new());
        let ctx = ctx(exec, Os::Windows);
        let result = run_target(&tmux(), &ctx, &CaptureLog::default());
        let (kind, reason) = failure(result.outcome).unwrap();
        assert_eq!(kind, FailureKind::Install);
        assert_eq!(reason, "no install strategy for 'tmux' on windows");
    }

    #[test]
    fn platform_gate_skips() {
        let mut coreutils = Target::new("coreutils");
        coreutils.platforms = vec![OsCondition::MacOs];
        let exec = Arc::new(MockExecutor::new());
        let ctx = ctx(Arc::clone(&exec), Os::Linux);
        let result = run_target(&coreutils, &ctx, &CaptureLog::default());
        assert_eq!(
            result.outcome,
            Outcome::Skipped {
                reason: "not applicable on linux".to_string()
            }
        );
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn option_gates_select_steps() {
        let mut emacs = Target::new("emacs");
        emacs.options = vec!["windowed".to_string()];
        emacs.check = OsVariants::common(vec![binary("emacs")]);
        emacs.install = OsVariants::common(vec![
            InstallStep {
                gate: OptionGate::With("windowed".to_string()),
                ..pacman("emacs")
            },
            InstallStep {
                gate: OptionGate::Without("windowed".to_string()),
                ..pacman("emacs-nox")
            },
        ]);

        let exec = Arc::new(MockExecutor::new());
        let plain = ctx(Arc::clone(&exec), Os::Linux).with_dry_run(true);
        let log = CaptureLog::default();
        assert_eq!(run_target(&emacs, &plain, &log).outcome, Outcome::DryRun);
        assert_eq!(log.at(Level::DryRun), vec!["would pacman -S emacs-nox"]);

        let windowed = plain.with_options(vec!["emacs.windowed".to_string()]);
        let log = CaptureLog::default();
        run_target(&emacs, &windowed, &log);
        assert_eq!(log.at(Level::DryRun), vec!["would pacman -S emacs"]);
        assert_eq!(exec.count("pacman -S"), 0);
    }

    #[test]
    fn dry_run_annotates_installed_packages() {
        let exec = Arc::new(
            MockExecutor::new()
                .with_which("pacman")
                .ok("pacman -Q tmux", "tmux 3.4-1"),
        );
        let ctx = ctx(exec, Os::Linux).with_dry_run(true);
        let log = CaptureLog::default();
        assert_eq!(run_target(&tmux(), &ctx, &log).outcome, Outcome::DryRun);
        assert_eq!(
            log.at(Level::DryRun),
            vec!["would pacman -S tmux (already installed)"]
        );
    }

    #[test]
    fn empty_check_is_satisfied() {
        let exec = Arc::new(MockExecutor::new());
        let ctx = ctx(Arc::clone(&exec), Os::Linux);
        let mut bare = Target::new("dotfiles");
        bare.install = OsVariants::common(vec![pacman("never")]);
        assert_eq!(
            run_target(&bare, &ctx, &CaptureLog::default()).outcome,
            Outcome::AlreadySatisfied
        );
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn check_only_for_other_platforms_installs() {
        let exec = Arc::new(MockExecutor::new().with_which("pacman"));
        let ctx = ctx(Arc::clone(&exec), Os::Linux);
        let mut t = Target::new("coreutils");
        t.check = OsVariants::default().with_variant(OsCondition::MacOs, vec![binary("gls")]);
        t.install = OsVariants::common(vec![pacman("coreutils")]);
        assert_eq!(
            run_target(&t, &ctx, &CaptureLog::default()).outcome,
            Outcome::Installed
        );
        assert_eq!(exec.count("sudo pacman -S --needed --noconfirm coreutils"), 1);
    }

    #[test]
    fn cancellation_before_start() {
        let exec = Arc::new(MockExecutor::new());
        let ctx = ctx(Arc::clone(&exec), Os::Linux);
        ctx.cancel.cancel();
        let result = run_target(&tmux(), &ctx, &CaptureLog::default());
        assert_eq!(
            result.outcome,
            Outcome::failed(FailureKind::Cancelled, "cancelled")
        );
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn cancelled_installer_is_cancelled() {
        let exec = Arc::new(MockExecutor::new().with_which("brew").cancelled());
        let ctx = ctx(exec, Os::MacOs);
        let mut t = tmux();
        t.check = OsVariants::default().with_variant(OsCondition::Linux, vec![binary("tmux")]);
        let result = run_target(&t, &ctx, &CaptureLog::default());
        assert_eq!(
            result.outcome,
            Outcome::failed(FailureKind::Cancelled, "cancelled")
        );
    }
}
