//! Dependency-driven parallel execution of resolved targets.
//!
//! A bounded pool of OS threads (`std::thread::scope`) pulls targets from a
//! shared [`Board`] in resolver order.  A target is handed out once every
//! in-run prerequisite has finished; workers with nothing ready wait on a
//! [`Condvar`].  Output of targets running concurrently is buffered per
//! target and flushed when the target finishes.
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::logging::{BufferedLog, Log, Logger};
use crate::manifest::Target;

use super::context::Context;
use super::lifecycle::{Lifecycle, State};
use super::report::{FailureKind, Outcome, RunResult};
use super::resolver::prerequisite_map;
use super::runner::run_target;

/// How often idle workers re-check the cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// What a worker should do next.
enum Job<'m> {
    /// Run the target.
    Run(&'m Target),
    /// Fail the target without running it.
    Unmet(&'m Target, String),
}

#[derive(Debug)]
struct Shared<'m> {
    pending: Vec<&'m Target>,
    /// Finished targets and whether they failed.
    finished: HashMap<&'m str, bool>,
    results: Vec<RunResult>,
}

/// Shared scheduling state.
#[derive(Debug)]
struct Board<'m> {
    shared: Mutex<Shared<'m>>,
    condvar: Condvar,
    prerequisites: HashMap<&'m str, Vec<&'m str>>,
}

impl<'m> Board<'m> {
    fn new(order: &[&'m Target], ctx: &Context) -> Self {
        Self {
            shared: Mutex::new(Shared {
                pending: order.to_vec(),
                finished: HashMap::with_capacity(order.len()),
                results: Vec::with_capacity(order.len()),
            }),
            condvar: Condvar::new(),
            prerequisites: prerequisite_map(order, &ctx.platform),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<'m>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready(&self, shared: &Shared<'m>, target: &Target) -> bool {
        self.prerequisites
            .get(target.id.as_str())
            .is_none_or(|deps| deps.iter().all(|d| shared.finished.contains_key(d)))
    }

    /// Block until a target is ready.
    ///
    /// Returns `None` when nothing is left.  On cancellation every pending
    /// target is recorded as cancelled and `None` is returned.
    fn take(&self, ctx: &Context) -> Option<Job<'m>> {
        let mut shared = self.lock();
        loop {
            if shared.pending.is_empty() {
                return None;
            }
            if ctx.cancel.is_cancelled() {
                for target in std::mem::take(&mut shared.pending) {
                    shared.finished.insert(&target.id, true);
                    shared.results.push(RunResult::new(
                        target.id.clone(),
                        Outcome::failed(FailureKind::Cancelled, "cancelled"),
                    ));
                }
                drop(shared);
                self.condvar.notify_all();
                return None;
            }
            if let Some(index) = shared.pending.iter().position(|t| self.ready(&shared, t)) {
                let target = shared.pending.remove(index);
                let has_failed = |d: &str| shared.finished.get(d).copied().unwrap_or(false);
                let parent = target.parent.as_deref().filter(|p| has_failed(*p));
                let required = target.required_on(&ctx.platform).find(|d| has_failed(*d));
                return Some(match (parent, required) {
                    (Some(p), _) => Job::Unmet(target, format!("parent '{p}' failed")),
                    (None, Some(dep)) => {
                        Job::Unmet(target, format!("required dependency '{dep}' failed"))
                    }
                    (None, None) => Job::Run(target),
                });
            }
            shared = self
                .condvar
                .wait_timeout(shared, CANCEL_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Record `target` as finished and wake waiting workers.
    fn finish(&self, target: &'m Target, result: RunResult) {
        let mut shared = self.lock();
        shared
            .finished
            .insert(&target.id, result.outcome.is_failed());
        shared.results.push(result);
        drop(shared);
        self.condvar.notify_all();
    }

    fn into_results(self) -> Vec<RunResult> {
        self.shared
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .results
    }
}

/// Run `order` to completion and return results in completion order.
///
/// With one job, targets run strictly in resolver order.  When `progress`
/// is given and more than one job runs, each target logs into a
/// [`BufferedLog`] flushed on completion and the logger shows a progress
/// line of active targets.
#[must_use]
pub fn execute(order: &[&Target], ctx: &Context, progress: Option<&Arc<Logger>>) -> Vec<RunResult> {
    let board = Board::new(order, ctx);
    let workers = ctx.jobs.clamp(1, order.len().max(1));
    let buffered = progress.filter(|_| workers > 1);

    std::thread::scope(|s| {
        for _ in 0..workers {
            let board = &board;
            s.spawn(move || {
                while let Some(job) = board.take(ctx) {
                    let (target, result) = match job {
                        Job::Unmet(target, reason) => (target, unmet(target, reason, ctx)),
                        Job::Run(target) => (target, run(target, ctx, buffered)),
                    };
                    board.finish(target, result);
                }
            });
        }
    });

    board.into_results()
}

fn run(target: &Target, ctx: &Context, buffered: Option<&Arc<Logger>>) -> RunResult {
    let Some(logger) = buffered else {
        ctx.log.stage(&target.id);
        return run_target(target, ctx, ctx.log.as_ref());
    };
    logger.notify_start(&target.id);
    let buf = Arc::new(BufferedLog::new(Arc::clone(logger)));
    let target_ctx = ctx.with_log(Arc::clone(&buf) as Arc<dyn Log>);
    target_ctx.log.stage(&target.id);
    let result = run_target(target, &target_ctx, target_ctx.log.as_ref());
    buf.flush_and_complete(&target.id);
    result
}

fn unmet(target: &Target, reason: String, ctx: &Context) -> RunResult {
    let log = ctx.log.as_ref();
    if let Err(e) = Lifecycle::new(&target.id).advance(State::Failed, log) {
        log.error(&e.to_string());
    }
    log.error(&format!("{}: {reason}", target.id));
    RunResult::new(
        target.id.clone(),
        Outcome::failed(FailureKind::DependencyUnmet, reason),
    )
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;
    use crate::logging::isolated_logger;
    use crate::logging::test_helpers::CaptureLog;
    use crate::manifest::{
        Dependency, EnginePaths, InstallStep, Installer, OptionGate, OsVariants, Probe,
        Requirement,
    };
    use crate::platform::{Os, Platform};

    fn ctx(exec: Arc<MockExecutor>, jobs: usize) -> Context {
        Context::new(
            EnginePaths::new("/repo", "/home/u", None),
            Platform::new(Os::Linux, &["arch"]),
            Arc::new(CaptureLog::default()),
        )
        .with_executor(exec)
        .with_jobs(jobs)
    }

    /// Target checked by a binary of the same name, installed with pacman.
    fn tool(id: &str, requires: &[&str]) -> Target {
        let mut t = Target::new(id);
        t.check = OsVariants::common(vec![Probe::Binary {
            name: id.to_string(),
            version_arg: "--version".to_string(),
            returns_nonzero: false,
            skip_prefix: None,
        }]);
        t.install = OsVariants::common(vec![InstallStep {
            installer: Installer::Pacman {
                package: id.to_string(),
            },
            gate: OptionGate::Always,
        }]);
        t.dependencies = requires
            .iter()
            .map(|d| Dependency {
                target: (*d).to_string(),
                requirement: Requirement::Required,
                os: None,
            })
            .collect();
        t
    }

    fn outcome<'r>(results: &'r [RunResult], id: &str) -> &'r Outcome {
        &results.iter().find(|r| r.target == id).unwrap().outcome
    }

    #[test]
    fn failed_dependency_blocks_dependent() {
        let exec = Arc::new(
            MockExecutor::new()
                .with_which("pacman")
                .fail("sudo pacman -S --needed --noconfirm beta", "boom"),
        );
        let beta = tool("beta", &[]);
        let alpha = tool("alpha", &["beta"]);
        let results = execute(&[&beta, &alpha], &ctx(Arc::clone(&exec), 1), None);

        assert_eq!(results.len(), 2);
        assert!(matches!(
            outcome(&results, "beta"),
            Outcome::Failed {
                kind: FailureKind::Install,
                ..
            }
        ));
        assert_eq!(
            outcome(&results, "alpha"),
            &Outcome::failed(
                FailureKind::DependencyUnmet,
                "required dependency 'beta' failed"
            )
        );
        assert_eq!(exec.count("sudo pacman -S --needed --noconfirm alpha"), 0);
        assert_eq!(exec.count("alpha"), 0);
    }

    #[test]
    fn sequential_runs_in_resolver_order() {
        let exec = Arc::new(MockExecutor::new().with_which("a").with_which("b").with_which("c"));
        let (a, b, c) = (tool("a", &[]), tool("b", &["a"]), tool("c", &[]));
        let results = execute(&[&a, &b, &c], &ctx(exec, 1), None);
        let order: Vec<&str> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| r.outcome == Outcome::AlreadySatisfied));
    }

    #[test]
    fn parallel_respects_dependencies() {
        let ids = ["git", "curl", "zsh", "zplug", "tmux"];
        let exec = Arc::new(ids.iter().fold(MockExecutor::new(), |m, id| m.with_which(id)));
        let targets: Vec<Target> = vec![
            tool("git", &[]),
            tool("curl", &[]),
            tool("zsh", &["git"]),
            tool("zplug", &["zsh", "curl"]),
            tool("tmux", &[]),
        ];
        let order: Vec<&Target> = targets.iter().collect();
        let (logger, _tmp, _guard) = isolated_logger();
        let logger = Arc::new(logger);
        let results = execute(&order, &ctx(exec, 4), Some(&logger));

        assert_eq!(results.len(), 5);
        let position = |id: &str| results.iter().position(|r| r.target == id).unwrap();
        assert!(position("git") < position("zsh"));
        assert!(position("zsh") < position("zplug"));
        assert!(position("curl") < position("zplug"));
        assert!(results.iter().all(|r| r.outcome == Outcome::AlreadySatisfied));
    }

    #[test]
    fn failed_parent_blocks_child() {
        let exec = Arc::new(
            MockExecutor::new()
                .with_which("pacman")
                .fail("sudo pacman -S --needed --noconfirm emacs", "boom"),
        );
        let mut emacs = tool("emacs", &[]);
        emacs.children = vec!["cask".to_string()];
        let mut cask = tool("cask", &[]);
        cask.parent = Some("emacs".to_string());
        let results = execute(&[&emacs, &cask], &ctx(Arc::clone(&exec), 2), None);
        assert!(outcome(&results, "emacs").is_failed());
        assert_eq!(
            outcome(&results, "cask"),
            &Outcome::failed(FailureKind::DependencyUnmet, "parent 'emacs' failed")
        );
        assert_eq!(results[0].target, "emacs");
        assert!(
            !exec
                .calls()
                .iter()
                .any(|c| c.contains("pacman -S --needed --noconfirm cask"))
        );
    }

    #[test]
    fn cancellation_fails_pending_targets() {
        let exec = Arc::new(MockExecutor::new());
        let ctx = ctx(Arc::clone(&exec), 2);
        ctx.cancel.cancel();
        let (a, b) = (tool("a", &[]), tool("b", &["a"]));
        let results = execute(&[&a, &b], &ctx, None);
        assert_eq!(results.len(), 2);
        assert!(
            results
                .iter()
                .all(|r| r.outcome == Outcome::failed(FailureKind::Cancelled, "cancelled"))
        );
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn empty_order_returns_nothing() {
        let exec = Arc::new(MockExecutor::new());
        assert!(execute(&[], &ctx(exec, 8), None).is_empty());
    }
}
