//! Graph construction: walks goal invocations outward through strong, weak,
//! and soft dependency declarations, selecting a version and reducing a
//! context at every node.

use std::collections::{BTreeMap, BTreeSet};

use mdl_context::{reduce_to_footprint, select_version};
use mdl_core::{Context, Document, Expansion, ValidationIssue};

use crate::footprint::compute_action_footprints;
use crate::graph::{Graph, GraphNode};
use crate::key::NodeKey;

pub struct GraphBuilder<'a> {
    document: &'a Document,
    host_platform: String,
    footprints: BTreeMap<String, BTreeSet<String>>,
    nodes: BTreeMap<NodeKey, GraphNode>,
    errors: Vec<ValidationIssue>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(document: &'a Document, host_platform: impl Into<String>) -> Self {
        Self {
            document,
            host_platform: host_platform.into(),
            footprints: compute_action_footprints(document),
            nodes: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Add one goal invocation's closure to the graph. `context` is the
    /// already-layered (default < global < per-invocation) context for this
    /// goal, prior to per-node reduction.
    pub fn add_goal(&mut self, goal: &str, context: &Context) -> Option<NodeKey> {
        self.visit(goal, context.clone())
    }

    /// Consume the builder, returning the graph and any accumulated
    /// validation issues (missing actions or unresolved version selection,
    /// found while walking).
    pub fn finish(self, goals: Vec<NodeKey>) -> (Graph, Vec<ValidationIssue>) {
        (
            Graph {
                nodes: self.nodes,
                goals,
            },
            self.errors,
        )
    }

    fn visit(&mut self, action_name: &str, inherited: Context) -> Option<NodeKey> {
        let Some(action) = self.document.find_action(action_name) else {
            self.errors.push(ValidationIssue::NoMatchingVersion {
                action: action_name.to_string(),
                context: inherited.label(),
            });
            return None;
        };

        let footprint = self.footprints.get(action_name).cloned().unwrap_or_default();
        let reduced = reduce_to_footprint(&inherited, &footprint);
        let key = NodeKey::new(action_name, reduced.clone());

        if self.nodes.contains_key(&key) {
            return Some(key);
        }

        let version = match select_version(action, &reduced, &self.host_platform) {
            Ok(v) => v.clone(),
            Err(issue) => {
                self.errors.push(issue);
                return None;
            }
        };

        // Insert a placeholder before recursing so a cycle through this node
        // terminates instead of looping forever; the validator's `cycle()`
        // pass is the authority on whether this is actually an error.
        self.nodes.insert(
            key.clone(),
            GraphNode {
                key: key.clone(),
                version: version.clone(),
                strong_deps: BTreeSet::new(),
                weak_deps: BTreeSet::new(),
                soft_deps: BTreeMap::new(),
            },
        );

        let mut strong_targets: BTreeSet<String> = version.strong_deps.iter().cloned().collect();
        let mut weak_targets: BTreeSet<String> = version.weak_deps.iter().cloned().collect();
        for expansion in &version.expansions {
            match expansion {
                Expansion::ActionStrong { action, .. } => {
                    strong_targets.insert(action.clone());
                }
                Expansion::ActionWeak { action, .. } => {
                    weak_targets.insert(action.clone());
                }
                _ => {}
            }
        }

        let mut strong_deps = BTreeSet::new();
        for target in &strong_targets {
            if let Some(dep_key) = self.visit(target, reduced.clone()) {
                strong_deps.insert(dep_key);
            }
        }
        let mut weak_deps = BTreeSet::new();
        for target in &weak_targets {
            if let Some(dep_key) = self.visit(target, reduced.clone()) {
                weak_deps.insert(dep_key);
            }
        }
        let mut soft_deps = BTreeMap::new();
        for soft in &version.soft_deps {
            // The retainer is a strong prerequisite of the edge itself — its
            // retain signal must exist before the soft target can be
            // promoted — while the target is not, by itself, a strong dep.
            let Some(retainer_key) = self.visit(&soft.retainer, reduced.clone()) else {
                continue;
            };
            strong_deps.insert(retainer_key.clone());
            if let Some(target_key) = self.visit(&soft.target, reduced.clone()) {
                soft_deps.insert(target_key, retainer_key);
            }
        }

        if let Some(node) = self.nodes.get_mut(&key) {
            node.strong_deps = strong_deps;
            node.weak_deps = weak_deps;
            node.soft_deps = soft_deps;
        }

        Some(key)
    }
}
