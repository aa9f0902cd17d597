//! Command: evaluate checks without changing anything.
use std::sync::Arc;

use anyhow::Result;
use rayon::prelude::*;

use super::CommandSetup;
use crate::capabilities::version::Version;
use crate::cli::{CheckOpts, GlobalOpts};
use crate::engine::runner::evaluate_check;
use crate::engine::{Context, resolver};
use crate::exec::Cancellation;
use crate::logging::{Log, Logger};
use crate::manifest::Target;

/// Check result for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// All probes passed.
    Satisfied,
    /// A probe failed.
    Unsatisfied,
    /// The target does not apply on this platform.
    NotApplicable,
    /// A probe could not run.
    Error(String),
}

/// Evaluate the checks of `targets` in parallel.
///
/// Results keep the order of `targets`.
#[must_use]
pub fn evaluate(targets: &[&Target], ctx: &Context) -> Vec<(String, CheckStatus)> {
    targets
        .par_iter()
        .map(|target| {
            let status = if target.applies_to(&ctx.platform) {
                let minimum = target.min_version.as_deref().and_then(Version::parse);
                match evaluate_check(target, minimum.as_ref(), ctx, ctx.log.as_ref()) {
                    Ok(true) => CheckStatus::Satisfied,
                    Ok(false) => CheckStatus::Unsatisfied,
                    Err(e) => CheckStatus::Error(e.to_string()),
                }
            } else {
                CheckStatus::NotApplicable
            };
            (target.id.clone(), status)
        })
        .collect()
}

/// Run the check command.
///
/// Returns 0 when every applicable target is satisfied, 1 otherwise.
///
/// # Errors
///
/// Returns an error if setup fails or the requested targets cannot be
/// resolved.
pub fn run(global: &GlobalOpts, opts: &CheckOpts, log: &Arc<Logger>, cancel: &Cancellation) -> Result<i32> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    let ctx = setup.context(global, cancel, Arc::clone(log) as Arc<dyn Log>);
    let order = resolver::resolve(&setup.manifest, &opts.targets, &ctx.platform)?;

    log.stage("Checking targets");
    let results = evaluate(&order, &ctx);

    let mut unsatisfied = 0usize;
    for (id, status) in &results {
        match status {
            CheckStatus::Satisfied => log.info(&format!("\x1b[32m✓ {id}\x1b[0m")),
            CheckStatus::NotApplicable => log.info(&format!("\x1b[2m· {id} (not applicable)\x1b[0m")),
            CheckStatus::Unsatisfied => {
                unsatisfied += 1;
                log.info(&format!("\x1b[31m✗ {id}\x1b[0m"));
            }
            CheckStatus::Error(message) => {
                unsatisfied += 1;
                log.info(&format!("\x1b[31m✗ {id} ({message})\x1b[0m"));
            }
        }
    }
    log.info(&format!(
        "{} targets, {unsatisfied} not satisfied",
        results.len()
    ));
    Ok(i32::from(unsatisfied > 0))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::Executor;
    use crate::exec::test_helpers::MockExecutor;
    use crate::logging::test_helpers::CaptureLog;
    use crate::manifest::{EnginePaths, OsVariants, Probe};
    use crate::platform::{Os, OsCondition, Platform};

    fn binary(name: &str) -> Probe {
        Probe::Binary {
            name: name.to_string(),
            version_arg: "--version".to_string(),
            returns_nonzero: false,
            skip_prefix: None,
        }
    }

    #[test]
    fn statuses_keep_order() {
        let exec = Arc::new(MockExecutor::new().with_which("git"));
        let ctx = Context::new(
            EnginePaths::new("/repo", "/home/u", None),
            Platform::new(Os::Linux, &[]),
            Arc::new(CaptureLog::default()),
        )
        .with_executor(Arc::clone(&exec) as Arc<dyn Executor>);

        let mut git = Target::new("git");
        git.check = OsVariants::common(vec![binary("git")]);
        let mut tmux = Target::new("tmux");
        tmux.check = OsVariants::common(vec![binary("tmux")]);
        let mut coreutils = Target::new("coreutils");
        coreutils.platforms = vec![OsCondition::MacOs];
        let mut broken = Target::new("broken");
        broken.check = OsVariants::common(vec![Probe::Script {
            path: "/nonexistent/check.sh".into(),
            interpreter: None,
        }]);

        let results = evaluate(&[&git, &tmux, &coreutils, &broken], &ctx);
        let statuses: Vec<&CheckStatus> = results.iter().map(|(_, s)| s).collect();
        assert_eq!(results[0].0, "git");
        assert_eq!(
            statuses[..3],
            [
                &CheckStatus::Satisfied,
                &CheckStatus::Unsatisfied,
                &CheckStatus::NotApplicable
            ]
        );
        assert!(matches!(statuses[3], CheckStatus::Error(_)));
        assert_eq!(exec.count("sudo"), 0);
    }
}
