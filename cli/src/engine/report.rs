//! Run results, degraded-dependency notices and the final report.
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::logging::Log;
use crate::manifest::{Manifest, Requirement};
use crate::platform::Platform;

/// Why a target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A required dependency did not succeed.
    DependencyUnmet,
    /// An installer failed or none applied.
    Install,
    /// Installation succeeded but the check still fails.
    Verification,
    /// A configure action failed.
    Configure,
    /// A configure destination is occupied by something unmanaged.
    ConfigureConflict,
    /// The run was cancelled.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DependencyUnmet => "dependency unmet",
            Self::Install => "install failed",
            Self::Verification => "verification failed",
            Self::Configure => "configure failed",
            Self::ConfigureConflict => "configure conflict",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Terminal outcome of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The check passed and nothing changed.
    AlreadySatisfied,
    /// Install steps ran.
    Installed,
    /// Only configure actions changed something.
    Configured,
    /// The target does not apply here.
    Skipped {
        /// Why it was skipped.
        reason: String,
    },
    /// Changes were planned but not made.
    DryRun,
    /// The target failed.
    Failed {
        /// Classification.
        kind: FailureKind,
        /// Rendered error chain.
        reason: String,
    },
}

impl Outcome {
    /// Shorthand for a failure.
    #[must_use]
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether this is a failure.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Status label used in the summary.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AlreadySatisfied => "ok",
            Self::Installed => "installed",
            Self::Configured => "configured",
            Self::Skipped { .. } => "skipped",
            Self::DryRun => "dry run",
            Self::Failed { .. } => "failed",
        }
    }

    const fn style(&self) -> (&'static str, &'static str) {
        match self {
            Self::AlreadySatisfied => ("✓", "\x1b[32m"),
            Self::Installed | Self::Configured => ("✓", "\x1b[1;32m"),
            Self::Skipped { .. } => ("·", "\x1b[2m"),
            Self::DryRun => ("~", "\x1b[33m"),
            Self::Failed { .. } => ("✗", "\x1b[31m"),
        }
    }
}

/// Result of running one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Target identifier.
    pub target: String,
    /// Terminal outcome.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Hint text collected on success.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl RunResult {
    /// Result without hints.
    #[must_use]
    pub fn new(target: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            target: target.into(),
            outcome,
            hints: Vec::new(),
        }
    }
}

/// A soft dependency that could not be honoured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Target declaring the dependency.
    pub target: String,
    /// The missing or failed dependency.
    pub dependency: String,
    /// `recommended` or `optional`.
    pub requirement: Requirement,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome counts for the summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    /// Already satisfied.
    pub ok: usize,
    /// Installed or configured.
    pub changed: usize,
    /// Not applicable.
    pub skipped: usize,
    /// Planned only.
    pub dry_run: usize,
    /// Failed.
    pub failed: usize,
}

/// Aggregated results of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    /// Results in completion order.
    pub results: Vec<RunResult>,
    /// Degraded soft dependencies.
    pub notices: Vec<Notice>,
}

impl Report {
    /// Aggregate `results` and compute degraded-dependency notices.
    ///
    /// A soft dependency active on `platform` degrades when it is absent from
    /// the manifest or its own result failed.  Dependencies that simply were
    /// not part of the run are not reported.
    #[must_use]
    pub fn aggregate(results: Vec<RunResult>, manifest: &Manifest, platform: &Platform) -> Self {
        let by_id: HashMap<&str, &Outcome> = results
            .iter()
            .map(|r| (r.target.as_str(), &r.outcome))
            .collect();
        let mut notices = Vec::new();
        for result in &results {
            let Some(target) = manifest.get(&result.target) else {
                continue;
            };
            for dep in target.soft_on(platform) {
                let problem = if !manifest.contains(&dep.target) {
                    "is not defined in the manifest"
                } else if by_id.get(dep.target.as_str()).is_some_and(|o| o.is_failed()) {
                    "failed"
                } else {
                    continue;
                };
                notices.push(Notice {
                    target: result.target.clone(),
                    dependency: dep.target.clone(),
                    requirement: dep.requirement,
                    message: format!(
                        "{}: {} dependency '{}' {problem}",
                        result.target, dep.requirement, dep.target
                    ),
                });
            }
        }
        Self { results, notices }
    }

    /// Result for `target`, if it ran.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&RunResult> {
        self.results.iter().find(|r| r.target == target)
    }

    /// Whether any target failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failed())
    }

    /// Process exit code: 0 when nothing failed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    /// Outcome counts.
    #[must_use]
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for result in &self.results {
            match result.outcome {
                Outcome::AlreadySatisfied => counts.ok += 1,
                Outcome::Installed | Outcome::Configured => counts.changed += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
                Outcome::DryRun => counts.dry_run += 1,
                Outcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Serialise to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Log notices as they apply: recommended as warnings, optional as info.
    pub fn log_notices(&self, log: &dyn Log) {
        for notice in &self.notices {
            match notice.requirement {
                Requirement::Recommended => log.warn(&notice.message),
                _ => log.info(&notice.message),
            }
        }
    }

    /// Render the summary through `log`.
    pub fn render(&self, log: &dyn Log, log_file: Option<&Path>) {
        if self.results.is_empty() {
            return;
        }
        log.stage("Summary");

        for result in &self.results {
            let (icon, color) = result.outcome.style();
            let suffix = match &result.outcome {
                Outcome::Failed { kind, reason } => format!(" ({kind}: {reason})"),
                Outcome::Skipped { reason } => format!(" ({reason})"),
                Outcome::AlreadySatisfied => String::new(),
                other => format!(" ({})", other.label()),
            };
            log.info(&format!("{color}{icon} {}{suffix}\x1b[0m", result.target));
        }

        let c = self.counts();
        let total = self.results.len();
        log.info(&format!(
            "{total} targets: \x1b[32m{} ok\x1b[0m, \x1b[1;32m{} changed\x1b[0m, \x1b[2m{} skipped\x1b[0m, \x1b[33m{} dry-run\x1b[0m, \x1b[31m{} failed\x1b[0m",
            c.ok, c.changed, c.skipped, c.dry_run, c.failed
        ));

        let hinted: Vec<&RunResult> = self.results.iter().filter(|r| !r.hints.is_empty()).collect();
        if !hinted.is_empty() {
            log.stage("Hints");
            for result in hinted {
                log.info(&format!("\x1b[1m{}\x1b[0m", result.target));
                for line in result.hints.iter().flat_map(|h| h.lines()) {
                    log.info(&format!("  {line}"));
                }
            }
        }

        if !self.notices.is_empty() {
            log.stage("Notices");
            self.log_notices(log);
        }

        if let Some(path) = log_file {
            log.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}
