//! Command: print the resolved execution order.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ListOpts};
use crate::engine::resolver;
use crate::logging::Log;
use crate::manifest::Target;
use crate::platform::Platform;

/// One line per target: position, identifier, description and edges.
#[must_use]
pub fn describe(order: &[&Target], platform: &Platform) -> Vec<String> {
    order
        .iter()
        .enumerate()
        .map(|(i, target)| {
            let mut line = format!("{:>3}. {}", i + 1, target.id);
            if let Some(description) = &target.description {
                line.push_str(&format!(" - {description}"));
            }
            if !target.applies_to(platform) {
                line.push_str(" [not applicable]");
            }
            let edges: Vec<String> = target
                .dependencies
                .iter()
                .filter(|d| d.is_active(platform))
                .map(|d| format!("{} ({})", d.target, d.requirement))
                .collect();
            if !edges.is_empty() {
                line.push_str(&format!("\n       depends on: {}", edges.join(", ")));
            }
            line
        })
        .collect()
}

/// Run the list command.
///
/// # Errors
///
/// Returns an error if setup fails or the requested targets cannot be
/// resolved.
pub fn run(global: &GlobalOpts, opts: &ListOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let order = resolver::resolve(&setup.manifest, &opts.targets, &setup.platform)?;
    log.stage(&format!("Execution order ({})", setup.platform.describe()));
    for line in describe(&order, &setup.platform) {
        log.info(&line);
    }
    Ok(())
}
