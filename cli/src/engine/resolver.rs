//! Target selection and dependency ordering.
//!
//! The resolver turns the requested identifiers into the set of targets a run
//! touches and orders them so that every target follows its platform-active
//! required dependencies and its parent.  Recommended and optional edges never
//! order anything.
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ManifestError;
use crate::manifest::{Manifest, Requirement, Target};
use crate::platform::Platform;

/// Select and order targets for a run.
///
/// An empty `requested` list selects every target.  Otherwise the selection
/// is the closure of the requested targets over nested children, parents,
/// required dependencies and recommended dependencies that exist.
///
/// # Errors
///
/// Returns [`ManifestError::UnknownTarget`] for an unknown request,
/// [`ManifestError::UnknownDependency`] for a dangling required edge, and
/// [`ManifestError::DependencyCycle`] when the ordering edges form a cycle.
pub fn resolve<'m>(
    manifest: &'m Manifest,
    requested: &[String],
    platform: &Platform,
) -> Result<Vec<&'m Target>, ManifestError> {
    let selected = select(manifest, requested, platform)?;

    let mut order = Vec::with_capacity(selected.len());
    let mut done = HashSet::new();
    let mut stack = Vec::new();
    for target in manifest.targets() {
        if selected.contains(target.id.as_str()) {
            visit(manifest, target, platform, &mut done, &mut stack, &mut order)?;
        }
    }
    Ok(order)
}

fn select<'m>(
    manifest: &'m Manifest,
    requested: &[String],
    platform: &Platform,
) -> Result<HashSet<&'m str>, ManifestError> {
    if requested.is_empty() {
        return Ok(manifest.targets().iter().map(|t| t.id.as_str()).collect());
    }

    let mut selected = HashSet::new();
    let mut queue = VecDeque::new();
    for id in requested {
        let target = manifest
            .get(id)
            .ok_or_else(|| ManifestError::UnknownTarget(id.clone()))?;
        queue.push_back(target);
    }

    while let Some(target) = queue.pop_front() {
        if !selected.insert(target.id.as_str()) {
            continue;
        }
        let pulled = target
            .children
            .iter()
            .chain(target.parent.iter())
            .map(String::as_str)
            .chain(target.required_on(platform))
            .chain(
                target
                    .soft_on(platform)
                    .filter(|d| d.requirement == Requirement::Recommended)
                    .filter(|d| manifest.contains(&d.target))
                    .map(|d| d.target.as_str()),
            );
        for id in pulled {
            let next = manifest
                .get(id)
                .ok_or_else(|| ManifestError::UnknownDependency {
                    target: target.id.clone(),
                    dependency: id.to_string(),
                })?;
            queue.push_back(next);
        }
    }
    Ok(selected)
}

/// Ordering edges of `target`: its parent, then its active required
/// dependencies.
fn prerequisites<'t>(target: &'t Target, platform: &'t Platform) -> impl Iterator<Item = &'t str> {
    target
        .parent
        .iter()
        .map(String::as_str)
        .chain(target.required_on(platform))
}

fn visit<'m>(
    manifest: &'m Manifest,
    target: &'m Target,
    platform: &Platform,
    done: &mut HashSet<&'m str>,
    stack: &mut Vec<&'m str>,
    order: &mut Vec<&'m Target>,
) -> Result<(), ManifestError> {
    let id = target.id.as_str();
    if done.contains(id) {
        return Ok(());
    }
    if let Some(start) = stack.iter().position(|s| *s == id) {
        let mut path: Vec<&str> = stack.get(start..).unwrap_or_default().to_vec();
        path.push(id);
        return Err(ManifestError::DependencyCycle(path.join(" → ")));
    }

    stack.push(id);
    for dep in prerequisites(target, platform) {
        let next = manifest
            .get(dep)
            .ok_or_else(|| ManifestError::UnknownDependency {
                target: id.to_string(),
                dependency: dep.to_string(),
            })?;
        visit(manifest, next, platform, done, stack, order)?;
    }
    stack.pop();

    done.insert(id);
    order.push(target);
    Ok(())
}

/// In-run required prerequisites of each target in `order`.
///
/// Edges to targets outside `order` are dropped; the scheduler only waits on
/// targets it runs.
#[must_use]
pub fn prerequisite_map<'m>(
    order: &[&'m Target],
    platform: &Platform,
) -> HashMap<&'m str, Vec<&'m str>> {
    let in_run: HashSet<&'m str> = order.iter().map(|t| t.id.as_str()).collect();
    order
        .iter()
        .map(|t| {
            let deps = prerequisites(t, platform)
                .filter_map(|d| in_run.get(d).copied())
                .collect();
            (t.id.as_str(), deps)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::manifest::Dependency;
    use crate::platform::{Os, OsCondition};

    fn dep(target: &str, requirement: Requirement) -> Dependency {
        Dependency {
            target: target.to_string(),
            requirement,
            os: None,
        }
    }

    fn target(id: &str, deps: Vec<Dependency>) -> Target {
        let mut t = Target::new(id);
        t.dependencies = deps;
        t
    }

    fn ids(order: &[&Target]) -> Vec<String> {
        order.iter().map(|t| t.id.clone()).collect()
    }

    fn linux() -> Platform {
        Platform::new(Os::Linux, &[])
    }

    #[test]
    fn required_dependencies_come_first() {
        let manifest = Manifest::new(vec![
            target("zsh", vec![dep("git", Requirement::Required)]),
            target("tmux", vec![]),
            target("git", vec![]),
        ]);
        let order = resolve(&manifest, &[], &linux()).unwrap();
        assert_eq!(ids(&order), vec!["git", "zsh", "tmux"]);
    }

    #[test]
    fn soft_edges_do_not_order() {
        let manifest = Manifest::new(vec![
            target("zsh", vec![dep("zplug", Requirement::Recommended)]),
            target("zplug", vec![dep("zsh", Requirement::Optional)]),
        ]);
        let order = resolve(&manifest, &[], &linux()).unwrap();
        assert_eq!(ids(&order), vec!["zsh", "zplug"]);
    }

    #[test]
    fn required_cycle_reports_path() {
        let manifest = Manifest::new(vec![
            target("a", vec![dep("b", Requirement::Required)]),
            target("b", vec![dep("c", Requirement::Required)]),
            target("c", vec![dep("a", Requirement::Required)]),
        ]);
        let err = resolve(&manifest, &[], &linux()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "dependency cycle detected: a → b → c → a"
        );
    }

    #[test]
    fn inactive_edges_are_ignored() {
        let manifest = Manifest::new(vec![
            target(
                "a",
                vec![Dependency {
                    os: Some(OsCondition::MacOs),
                    ..dep("b", Requirement::Required)
                }],
            ),
            target("b", vec![dep("a", Requirement::Required)]),
        ]);
        let order = resolve(&manifest, &[], &linux()).unwrap();
        assert_eq!(ids(&order), vec!["a", "b"]);
        assert!(resolve(&manifest, &[], &Platform::new(Os::MacOs, &[])).is_err());
    }

    #[test]
    fn request_closure() {
        let mut emacs = target(
            "emacs",
            vec![
                dep("git", Requirement::Required),
                dep("aspell", Requirement::Recommended),
                dep("ripgrep", Requirement::Optional),
                dep("absent", Requirement::Recommended),
            ],
        );
        emacs.children = vec!["cask".to_string()];
        let mut cask = target("cask", vec![]);
        cask.parent = Some("emacs".to_string());
        let manifest = Manifest::new(vec![
            target("git", vec![dep("curl", Requirement::Required)]),
            target("curl", vec![]),
            emacs,
            cask,
            target("aspell", vec![]),
            target("ripgrep", vec![]),
            target("tmux", vec![]),
        ]);

        let order = resolve(&manifest, &["emacs".to_string()], &linux()).unwrap();
        assert_eq!(ids(&order), vec!["curl", "git", "emacs", "cask", "aspell"]);

        let order = resolve(&manifest, &["cask".to_string()], &linux()).unwrap();
        assert!(ids(&order).contains(&"emacs".to_string()));
    }

    #[test]
    fn unknown_request_is_an_error() {
        let manifest = Manifest::new(vec![target("git", vec![])]);
        assert!(matches!(
            resolve(&manifest, &["nope".to_string()], &linux()),
            Err(ManifestError::UnknownTarget(id)) if id == "nope"
        ));
    }

    #[test]
    fn children_follow_parents() {
        let mut sub = target("sub", vec![]);
        sub.parent = Some("top".to_string());
        let mut top = target("top", vec![]);
        top.children = vec!["sub".to_string()];
        let manifest = Manifest::new(vec![sub, top]);
        let order = resolve(&manifest, &[], &linux()).unwrap();
        assert_eq!(ids(&order), vec!["top", "sub"]);
        let map = prerequisite_map(&order, &linux());
        assert_eq!(map["sub"], vec!["top"]);
        assert!(map["top"].is_empty());
    }
}
