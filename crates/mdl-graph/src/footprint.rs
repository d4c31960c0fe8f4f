//! Static, context-independent axis footprint per action.
//!
//! A node's context must retain bindings for every axis that could affect
//! *its own* version selection, and for every axis that could affect the
//! selection of anything upstream of it in the dependency graph (an
//! "ancestor" — an action that could, via some version, depend on this one).
//! Carrying the ancestor's axes too is what keeps two call sites of the same
//! action from wrongly unifying when an ancestor's selection differs only by
//! an axis this action's own conditions never mention.
//!
//! Both halves are computed once per document and are independent of any
//! concrete invocation: the dependency edges considered here are the
//! *potential* ones (the union across every version of an action), not the
//! ones a particular build actually walks.

use std::collections::{BTreeMap, BTreeSet};

use mdl_core::Document;

/// For every action, the axis names whose bindings its nodes must retain.
pub fn compute_action_footprints(document: &Document) -> BTreeMap<String, BTreeSet<String>> {
    let mut own: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for action in &document.actions {
        let footprint = own.entry(action.name.clone()).or_default();
        for version in &action.versions {
            footprint.extend(version.own_axis_footprint());
        }
        dependents.entry(action.name.clone()).or_default();
        for target in potential_dependency_targets(action) {
            dependents.entry(target).or_default().insert(action.name.clone());
        }
    }

    let mut result = BTreeMap::new();
    for action in &document.actions {
        let mut footprint = own.get(&action.name).cloned().unwrap_or_default();
        footprint.extend(ancestor_footprint(&action.name, &own, &dependents));
        result.insert(action.name.clone(), footprint);
    }
    result
}

fn potential_dependency_targets(action: &mdl_core::ActionDefinition) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    for version in &action.versions {
        targets.extend(version.strong_deps.iter().cloned());
        targets.extend(version.weak_deps.iter().cloned());
        for soft in &version.soft_deps {
            targets.insert(soft.target.clone());
            targets.insert(soft.retainer.clone());
        }
        for expansion in &version.expansions {
            match expansion {
                mdl_core::Expansion::ActionStrong { action, .. }
                | mdl_core::Expansion::ActionWeak { action, .. } => {
                    targets.insert(action.clone());
                }
                _ => {}
            }
        }
    }
    targets
}

/// BFS over the reverse (dependents) graph, unioning every reachable
/// ancestor's own footprint.
fn ancestor_footprint(
    action: &str,
    own: &BTreeMap<String, BTreeSet<String>>,
    dependents: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue: Vec<&str> = dependents
        .get(action)
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    let mut footprint = BTreeSet::new();

    while let Some(ancestor) = queue.pop() {
        if !seen.insert(ancestor.to_string()) {
            continue;
        }
        if let Some(axes) = own.get(ancestor) {
            footprint.extend(axes.iter().cloned());
        }
        if let Some(next) = dependents.get(ancestor) {
            queue.extend(next.iter().map(String::as_str));
        }
    }

    footprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_core::{ActionDefinition, ActionVersion, Condition, Language};

    fn version(conditions: Vec<Condition>, strong_deps: Vec<&str>) -> ActionVersion {
        ActionVersion {
            script: "echo hi".into(),
            language: Language::Bash,
            conditions,
            expansions: vec![],
            returns: vec![],
            strong_deps: strong_deps.into_iter().map(String::from).collect(),
            weak_deps: vec![],
            soft_deps: vec![],
            env_deps: vec![],
            args: vec![],
            flags: vec![],
        }
    }

    #[test]
    fn dependency_inherits_ancestors_axis_footprint() {
        let document = Document {
            actions: vec![
                ActionDefinition {
                    name: "build".into(),
                    description: String::new(),
                    required_env: vec![],
                    versions: vec![version(
                        vec![Condition::Axis {
                            name: "build-mode".into(),
                            value: "release".into(),
                        }],
                        vec!["compile"],
                    )],
                },
                ActionDefinition {
                    name: "compile".into(),
                    description: String::new(),
                    required_env: vec![],
                    versions: vec![version(vec![], vec![])],
                },
            ],
            axes: vec![],
            environment: Default::default(),
        };

        let footprints = compute_action_footprints(&document);
        assert!(footprints["build"].contains("build-mode"));
        assert!(footprints["compile"].contains("build-mode"));
    }

    #[test]
    fn unrelated_action_has_empty_footprint() {
        let document = Document {
            actions: vec![ActionDefinition {
                name: "lint".into(),
                description: String::new(),
                required_env: vec![],
                versions: vec![version(vec![], vec![])],
            }],
            axes: vec![],
            environment: Default::default(),
        };
        let footprints = compute_action_footprints(&document);
        assert!(footprints["lint"].is_empty());
    }
}
