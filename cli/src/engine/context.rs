//! Immutable run context shared by every target.
use std::sync::Arc;

use crate::capabilities::Capabilities;
use crate::exec::{Cancellation, Executor, SystemExecutor};
use crate::logging::Log;
use crate::manifest::{EnginePaths, Target};
use crate::platform::Platform;
use crate::resources::template::{DefaultRenderer, TemplateRenderer, TemplateVars};

/// Shared state for one run.
///
/// Built once by the command layer and read by every worker; per-target
/// logging goes through [`with_log`](Self::with_log).
#[derive(Clone)]
pub struct Context {
    /// Root, home and local directories.
    pub paths: EnginePaths,
    /// Detected or overridden platform.
    pub platform: Platform,
    /// Enabled options (`windowed` or `emacs.windowed`).
    pub options: Vec<String>,
    /// Whether to only log planned changes.
    pub dry_run: bool,
    /// Worker count.
    pub jobs: usize,
    /// Process executor.
    pub executor: Arc<dyn Executor>,
    /// Template collaborator.
    pub renderer: Arc<dyn TemplateRenderer>,
    /// Run cancellation token.
    pub cancel: Cancellation,
    /// Logger for this context.
    pub log: Arc<dyn Log>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("paths", &self.paths)
            .field("platform", &self.platform)
            .field("options", &self.options)
            .field("dry_run", &self.dry_run)
            .field("jobs", &self.jobs)
            .field("executor", &self.executor)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context with the system executor, default renderer and one
    /// job.
    #[must_use]
    pub fn new(paths: EnginePaths, platform: Platform, log: Arc<dyn Log>) -> Self {
        let cancel = Cancellation::new();
        Self {
            paths,
            platform,
            options: Vec::new(),
            dry_run: false,
            jobs: 1,
            executor: Arc::new(SystemExecutor::new(cancel.clone())),
            renderer: Arc::new(DefaultRenderer),
            cancel,
            log,
        }
    }

    /// Replace the executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the template renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the cancellation token.
    ///
    /// The executor keeps the token it was built with; pass the same token
    /// to both.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set enabled options.
    #[must_use]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Set dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Clone this context with a different logger.
    #[must_use]
    pub fn with_log(&self, log: Arc<dyn Log>) -> Self {
        Self {
            log,
            ..self.clone()
        }
    }

    /// Whether `option` is enabled for `target`.
    ///
    /// Only options the target declares can be enabled.
    #[must_use]
    pub fn option_enabled(&self, target: &Target, option: &str) -> bool {
        if !target.options.iter().any(|o| o == option) {
            return false;
        }
        let scoped = format!("{}.{option}", target.id);
        self.options.iter().any(|o| *o == option || *o == scoped)
    }

    /// Variables available to templates.
    #[must_use]
    pub fn template_vars(&self) -> TemplateVars {
        let path = |p: &std::path::Path| p.to_string_lossy().into_owned();
        TemplateVars::from([
            ("home".to_string(), path(&self.paths.home)),
            ("local".to_string(), path(&self.paths.local)),
            ("root".to_string(), path(&self.paths.root)),
            ("os".to_string(), self.platform.describe()),
        ])
    }

    /// Check and installer adapters bound to this context's executor.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities<'_> {
        Capabilities::new(self.executor.as_ref())
    }
}
