//! Configure step: apply a target's filesystem actions in order.
use crate::error::ConfigureError;
use crate::logging::Log;
use crate::manifest::{ConfigureAction, Target};
use crate::resources::remove::RemoveResource;
use crate::resources::symlink::SymlinkResource;
use crate::resources::template::{TemplateResource, TemplateVars};
use crate::resources::touch::TouchResource;
use crate::resources::{Resource, ResourceChange, ResourceState};

use super::context::Context;

/// A resource plus whether it may replace an existing destination.
struct Planned<'a> {
    resource: Box<dyn Resource + 'a>,
    replaces: bool,
}

fn plan<'a>(action: &ConfigureAction, ctx: &'a Context, vars: &'a TemplateVars) -> Planned<'a> {
    match action {
        ConfigureAction::Symlink {
            source,
            destination,
            managed,
        } => {
            let managed = *managed || ctx.paths.is_local(source);
            Planned {
                resource: Box::new(SymlinkResource::new(
                    source.clone(),
                    destination.clone(),
                    managed,
                )),
                replaces: managed,
            }
        }
        ConfigureAction::Template {
            template,
            destination,
        } => Planned {
            resource: Box::new(TemplateResource::new(
                template.clone(),
                destination.clone(),
                ctx.platform.primary_condition(),
                vars,
                ctx.renderer.as_ref(),
            )),
            replaces: false,
        },
        ConfigureAction::Remove { path } => Planned {
            resource: Box::new(RemoveResource::new(path.clone())),
            replaces: true,
        },
        ConfigureAction::Touch { path } => Planned {
            resource: Box::new(TouchResource::new(path.clone())),
            replaces: false,
        },
    }
}

/// Apply the configure actions of `target` selected for the run's platform.
///
/// Returns whether anything changed (or, in dry-run mode, would change).
/// Stops at the first failing action.
///
/// # Errors
///
/// Returns the [`ConfigureError`] of the first failing action.
pub fn configure(target: &Target, ctx: &Context, log: &dyn Log) -> Result<bool, ConfigureError> {
    let vars = ctx.template_vars();
    let mut changed = false;

    for action in target.configure.select(&ctx.platform) {
        let Planned { resource, replaces } = plan(action, ctx, &vars);
        let description = resource.description();

        if ctx.dry_run {
            match resource.current_state()? {
                ResourceState::Correct => log.debug(&format!("ok: {description}")),
                ResourceState::Missing => {
                    log.dry_run(&format!("would {description}"));
                    changed = true;
                }
                ResourceState::Incorrect { current } if replaces => {
                    log.dry_run(&format!("would replace ({current}): {description}"));
                    changed = true;
                }
                ResourceState::Incorrect { current } => {
                    log.warn(&format!("would conflict ({current}): {description}"));
                    changed = true;
                }
                ResourceState::Invalid { reason } => {
                    log.dry_run(&format!("would {description} ({reason})"));
                    changed = true;
                }
            }
            continue;
        }

        match resource.apply()? {
            ResourceChange::Applied => {
                log.info(&description);
                changed = true;
            }
            ResourceChange::AlreadyCorrect => log.debug(&format!("ok: {description}")),
        }
    }
    Ok(changed)
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::Level;
    use crate::logging::test_helpers::CaptureLog;
    use crate::manifest::{EnginePaths, OsVariants};
    use crate::platform::{Os, OsCondition, Platform};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn ctx(root: &Path) -> Context {
        Context::new(
            EnginePaths::new(root.join("repo"), root.join("home"), None),
            Platform::new(Os::MacOs, &[]),
            Arc::new(CaptureLog::default()),
        )
    }

    fn zsh(ctx: &Context) -> Target {
        let repo = &ctx.paths.root;
        let home = &ctx.paths.home;
        let local = &ctx.paths.local;
        fs::create_dir_all(repo).unwrap();
        fs::write(repo.join("zshrc"), "source ~/.zshrc.local").unwrap();
        fs::write(repo.join("zshrc.local"), "# local for ${os}").unwrap();
        let mut t = Target::new("zsh");
        t.configure = OsVariants::common(vec![
            ConfigureAction::Symlink {
                source: repo.join("zshrc"),
                destination: home.join(".zshrc"),
                managed: false,
            },
            ConfigureAction::Template {
                template: repo.join("zshrc.local"),
                destination: local.join("zshrc.local"),
            },
            ConfigureAction::Symlink {
                source: local.join("zshrc.local"),
                destination: home.join(".zshrc.local"),
                managed: false,
            },
            ConfigureAction::Remove {
                path: home.join(".zcompdump"),
            },
        ])
        .with_variant(
            OsCondition::Linux,
            vec![ConfigureAction::Touch {
                path: home.join(".linux-only"),
            }],
        );
        t
    }

    #[test]
    fn applies_in_order_then_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let target = zsh(&ctx);
        fs::create_dir_all(&ctx.paths.home).unwrap();
        fs::write(ctx.paths.home.join(".zcompdump"), "").unwrap();

        let log = CaptureLog::default();
        assert!(configure(&target, &ctx, &log).unwrap());
        let home = &ctx.paths.home;
        assert_eq!(
            fs::read_link(home.join(".zshrc")).unwrap(),
            ctx.paths.root.join("zshrc")
        );
        assert_eq!(
            fs::read_to_string(home.join(".zshrc.local")).unwrap(),
            "# local for macos"
        );
        assert!(!home.join(".zcompdump").exists());
        assert!(!home.join(".linux-only").exists());

        let again = CaptureLog::default();
        assert!(!configure(&target, &ctx, &again).unwrap());
        assert!(again.at(Level::Info).is_empty());
    }

    #[test]
    fn local_source_links_are_managed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let target = zsh(&ctx);
        let home = &ctx.paths.home;
        fs::create_dir_all(home).unwrap();
        fs::write(home.join(".zshrc.local"), "old").unwrap();

        configure(&target, &ctx, &CaptureLog::default()).unwrap();
        assert!(fs::symlink_metadata(home.join(".zshrc.local")).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(home.join(".zshrc.local.bak")).unwrap(), "old");
    }

    #[test]
    fn unmanaged_conflict_leaves_destination() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let target = zsh(&ctx);
        let home = &ctx.paths.home;
        fs::create_dir_all(home).unwrap();
        fs::write(home.join(".zshrc"), "mine").unwrap();

        let err = configure(&target, &ctx, &CaptureLog::default()).unwrap_err();
        assert!(matches!(err, ConfigureError::Conflict { .. }));
        assert_eq!(fs::read_to_string(home.join(".zshrc")).unwrap(), "mine");
        assert!(!ctx.paths.local.join("zshrc.local").exists(), "later actions never ran");
    }

    #[test]
    fn dry_run_plans_without_mutating() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path()).with_dry_run(true);
        let target = zsh(&ctx);
        let home = &ctx.paths.home;
        fs::create_dir_all(home).unwrap();
        fs::write(home.join(".zshrc"), "mine").unwrap();

        let log = CaptureLog::default();
        assert!(configure(&target, &ctx, &log).unwrap());
        assert!(log.at(Level::Warn)[0].starts_with("would conflict (a regular file exists)"));
        assert!(log.contains("would render"));
        assert!(!ctx.paths.local.exists());
        assert_eq!(fs::read_to_string(home.join(".zshrc")).unwrap(), "mine");
    }
}
