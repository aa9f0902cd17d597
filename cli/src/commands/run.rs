//! Command: check, install and configure targets.
use std::io::Write as _;
use std::sync::Arc;

use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, RunOpts};
use crate::engine;
use crate::exec::Cancellation;
use crate::logging::{Log, Logger};

/// Run the requested targets and render the report.
///
/// Returns the process exit code: 0 when no target failed, 1 otherwise.
///
/// # Errors
///
/// Returns an error if setup fails or the manifest cannot be resolved; no
/// target runs in that case.
pub fn run(global: &GlobalOpts, opts: &RunOpts, log: &Arc<Logger>, cancel: &Cancellation) -> Result<i32> {
    let version = option_env!("DOTFILE_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    log.info(&format!("dotfile {version}"));

    let setup = CommandSetup::init(global, log.as_ref())?;
    let ctx = setup.context(global, cancel, Arc::clone(log) as Arc<dyn Log>);
    if ctx.dry_run {
        log.info("dry run: nothing will be changed");
    }

    log.stage("Running targets");
    let report = engine::run(&setup.manifest, &opts.targets, &ctx, Some(log))?;

    if opts.json {
        writeln!(std::io::stdout(), "{}", report.to_json()?)?;
    } else {
        log.blank();
        report.render(log.as_ref(), log.log_path().map(std::path::PathBuf::as_path));
    }
    Ok(report.exit_code())
}
