//! Dependency resolution, target lifecycle, scheduling and reporting.
//!
//! A run resolves the requested targets against the manifest, executes them
//! with the [`scheduler`], and aggregates the results into a [`Report`].
//! Manifest errors abort before any target runs; per-target failures only
//! ever show up in the report.
pub mod configure;
pub mod context;
pub mod lifecycle;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod scheduler;

use std::sync::Arc;

use crate::error::ManifestError;
use crate::logging::Logger;
use crate::manifest::Manifest;

pub use context::Context;
pub use report::{FailureKind, Notice, Outcome, Report, RunResult};

/// Resolve `requested` and run the selected targets.
///
/// # Errors
///
/// Returns a [`ManifestError`] for unknown targets, dangling required
/// dependencies or required-dependency cycles.  Nothing runs in that case.
pub fn run(
    manifest: &Manifest,
    requested: &[String],
    ctx: &Context,
    progress: Option<&Arc<Logger>>,
) -> Result<Report, ManifestError> {
    let order = resolver::resolve(manifest, requested, &ctx.platform)?;
    ctx.log.debug(&format!(
        "execution order: {}",
        order
            .iter()
            .map(|t| t.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    let results = scheduler::execute(&order, ctx, progress);
    Ok(Report::aggregate(results, manifest, &ctx.platform))
}
