//! Plan construction over a validated graph: strong reachability, weak
//! retention, soft-edge watch list, and a deterministic topological order.

use std::collections::{BTreeMap, BTreeSet};

use mdl_graph::{Graph, NodeKey};

/// One soft edge whose target's inclusion is decided at dispatch time by
/// the retainer's signal (see the executor's retainer coordinator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftWatch {
    pub retainer: NodeKey,
    pub target: NodeKey,
}

/// A built execution plan: which nodes run, in what order, and which soft
/// edges remain to be resolved dynamically.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    /// Topological order of the statically reachable node set.
    pub order: Vec<NodeKey>,
    /// The strong-reachability set R.
    pub reachable: BTreeSet<NodeKey>,
    pub soft_watches: Vec<SoftWatch>,
}

impl Plan {
    /// Whether a weak or soft target is (already) part of the executable
    /// plan — drives the `${retained.weak.X}` / `${retained.soft.X}`
    /// expansions for nodes built before runtime promotion is known.
    pub fn is_reachable(&self, key: &NodeKey) -> bool {
        self.reachable.contains(key)
    }
}

/// Strong reachability set R: every node reachable from a goal via strong
/// edges only.
pub fn strong_reachable(graph: &Graph) -> BTreeSet<NodeKey> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<NodeKey> = graph.goals.clone();
    while let Some(key) = stack.pop() {
        if !seen.insert(key.clone()) {
            continue;
        }
        if let Some(node) = graph.node(&key) {
            stack.extend(node.strong_deps.iter().cloned());
        }
    }
    seen
}

/// Build a plan: reachability, soft watch list, and a topological order
/// tie-broken by `prior_order` (node ids from a previous run's plan, oldest
/// first) then lexicographically by node id.
pub fn build_plan(graph: &Graph, prior_order: &[String]) -> Plan {
    let reachable = strong_reachable(graph);
    let prior_rank: BTreeMap<&str, usize> = prior_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut remaining: BTreeMap<NodeKey, usize> = reachable
        .iter()
        .map(|key| {
            let count = graph
                .node(key)
                .map(|n| n.strong_deps.iter().filter(|d| reachable.contains(*d)).count())
                .unwrap_or(0);
            (key.clone(), count)
        })
        .collect();

    let mut dependents: BTreeMap<NodeKey, Vec<NodeKey>> = BTreeMap::new();
    for key in &reachable {
        if let Some(node) = graph.node(key) {
            for dep in &node.strong_deps {
                if reachable.contains(dep) {
                    dependents.entry(dep.clone()).or_default().push(key.clone());
                }
            }
        }
    }

    let mut ready: Vec<NodeKey> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(key, _)| key.clone())
        .collect();
    let mut order = Vec::with_capacity(reachable.len());

    while !ready.is_empty() {
        ready.sort_by(|a, b| tie_break(a, b, &prior_rank));
        let next = ready.remove(0);
        order.push(next.clone());
        if let Some(dependent_keys) = dependents.get(&next) {
            for dependent in dependent_keys {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(dependent.clone());
                    }
                }
            }
        }
    }

    let soft_watches = reachable
        .iter()
        .filter_map(|key| graph.node(key))
        .flat_map(|node| {
            node.soft_deps.iter().map(|(target, retainer)| SoftWatch {
                retainer: retainer.clone(),
                target: target.clone(),
            })
        })
        .collect();

    Plan {
        order,
        reachable,
        soft_watches,
    }
}

fn tie_break(a: &NodeKey, b: &NodeKey, prior_rank: &BTreeMap<&str, usize>) -> std::cmp::Ordering {
    let rank_a = prior_rank.get(a.id().as_str()).copied().unwrap_or(usize::MAX);
    let rank_b = prior_rank.get(b.id().as_str()).copied().unwrap_or(usize::MAX);
    rank_a.cmp(&rank_b).then_with(|| a.id().cmp(&b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_core::{ActionVersion, Context, Language};
    use mdl_graph::GraphNode;
    use std::collections::BTreeSet as Set;

    fn version() -> ActionVersion {
        ActionVersion {
            script: "echo hi".into(),
            language: Language::Bash,
            conditions: vec![],
            expansions: vec![],
            returns: vec![],
            strong_deps: vec![],
            weak_deps: vec![],
            soft_deps: vec![],
            env_deps: vec![],
            args: vec![],
            flags: vec![],
        }
    }

    fn node(name: &str, strong: &[&str]) -> GraphNode {
        GraphNode {
            key: NodeKey::new(name, Context::new()),
            version: version(),
            strong_deps: strong.iter().map(|n| NodeKey::new(*n, Context::new())).collect(),
            weak_deps: Set::new(),
            soft_deps: BTreeMap::new(),
        }
    }

    #[test]
    fn reachability_follows_only_strong_edges() {
        let mut graph = Graph::default();
        graph.nodes.insert(NodeKey::new("goal", Context::new()), node("goal", &["dep"]));
        graph.nodes.insert(NodeKey::new("dep", Context::new()), node("dep", &[]));
        graph.nodes.insert(NodeKey::new("unrelated", Context::new()), node("unrelated", &[]));
        graph.goals = vec![NodeKey::new("goal", Context::new())];

        let reachable = strong_reachable(&graph);
        assert_eq!(reachable.len(), 2);
        assert!(!reachable.contains(&NodeKey::new("unrelated", Context::new())));
    }

    #[test]
    fn topological_order_places_dependencies_first() {
        let mut graph = Graph::default();
        graph.nodes.insert(NodeKey::new("goal", Context::new()), node("goal", &["dep"]));
        graph.nodes.insert(NodeKey::new("dep", Context::new()), node("dep", &[]));
        graph.goals = vec![NodeKey::new("goal", Context::new())];

        let plan = build_plan(&graph, &[]);
        assert_eq!(plan.order[0].action, "dep");
        assert_eq!(plan.order[1].action, "goal");
    }

    #[test]
    fn prior_order_breaks_ties_before_lexicographic_id() {
        let mut graph = Graph::default();
        graph.nodes.insert(NodeKey::new("b-task", Context::new()), node("b-task", &[]));
        graph.nodes.insert(NodeKey::new("a-task", Context::new()), node("a-task", &[]));
        graph.goals = vec![
            NodeKey::new("b-task", Context::new()),
            NodeKey::new("a-task", Context::new()),
        ];

        let default_plan = build_plan(&graph, &[]);
        assert_eq!(default_plan.order[0].action, "a-task");

        let prior = vec!["b-task".to_string(), "a-task".to_string()];
        let prior_plan = build_plan(&graph, &prior);
        assert_eq!(prior_plan.order[0].action, "b-task");
    }
}
