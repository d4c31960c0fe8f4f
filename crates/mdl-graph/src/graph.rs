//! The materialized node set: one [`GraphNode`] per (action, reduced context)
//! pair, plus the strong/weak/soft edges between them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use mdl_core::{ActionVersion, ValidationIssue};

use crate::key::NodeKey;

/// One materialized node: the version it binds to, and the dependency edges
/// it carries on to its prerequisites.
#[derive(Clone, Debug)]
pub struct GraphNode {
    pub key: NodeKey,
    pub version: ActionVersion,
    pub strong_deps: BTreeSet<NodeKey>,
    pub weak_deps: BTreeSet<NodeKey>,
    /// target node -> the retainer node gating it.
    pub soft_deps: BTreeMap<NodeKey, NodeKey>,
}

impl GraphNode {
    /// Every node this one depends on, regardless of edge kind.
    pub fn all_deps(&self) -> impl Iterator<Item = &NodeKey> {
        self.strong_deps
            .iter()
            .chain(self.weak_deps.iter())
            .chain(self.soft_deps.keys())
    }
}

/// A fully built dependency graph.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub nodes: BTreeMap<NodeKey, GraphNode>,
    /// The goal nodes this graph was built from, in invocation order.
    pub goals: Vec<NodeKey>,
}

impl Graph {
    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    /// Cycle detection over strong edges only, via Kahn's algorithm — the
    /// only edge kind that must form a DAG (weak and soft edges are pruned
    /// or deferred before they can ever be walked at runtime).
    pub fn cycle(&self) -> Option<ValidationIssue> {
        let keys: Vec<&NodeKey> = self.nodes.keys().collect();
        let index: BTreeMap<&NodeKey, usize> =
            keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        let mut indegree = vec![0usize; keys.len()];
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
        for (i, key) in keys.iter().enumerate() {
            let node = &self.nodes[*key];
            for dep in &node.strong_deps {
                if let Some(&j) = index.get(dep) {
                    edges[i].push(j);
                    indegree[j] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(i, d)| (*d == 0).then_some(i))
            .collect();
        let mut visited = 0usize;
        while let Some(i) = queue.pop_front() {
            visited += 1;
            for &j in &edges[i] {
                indegree[j] = indegree[j].saturating_sub(1);
                if indegree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }

        if visited == keys.len() {
            return None;
        }

        let remaining: Vec<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(i, d)| (*d > 0).then_some(i))
            .collect();
        let path = trace_cycle(&remaining, &edges, &keys);
        Some(ValidationIssue::Cycle { path })
    }

    /// A topological order over strong edges, breaking ties lexicographically
    /// by node id for determinism. Assumes `cycle()` returned `None`.
    ///
    /// A node is ready once every node it strongly depends on has already
    /// been ordered; `dependents` is the reverse index used to advance the
    /// frontier as each node is placed.
    pub fn topological_order(&self) -> Vec<NodeKey> {
        let mut remaining: BTreeMap<NodeKey, usize> = self
            .nodes
            .iter()
            .map(|(k, n)| (k.clone(), n.strong_deps.len()))
            .collect();
        let mut dependents: BTreeMap<NodeKey, Vec<NodeKey>> = BTreeMap::new();
        for (key, node) in &self.nodes {
            for dep in &node.strong_deps {
                dependents.entry(dep.clone()).or_default().push(key.clone());
            }
        }

        let mut ready: BTreeSet<NodeKey> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(k, _)| k.clone())
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.iter().next().cloned() {
            ready.remove(&next);
            order.push(next.clone());
            if let Some(dependent_keys) = dependents.get(&next) {
                for dependent in dependent_keys {
                    if let Some(count) = remaining.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            ready.insert(dependent.clone());
                        }
                    }
                }
            }
        }

        order
    }

    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        let ids: BTreeMap<&NodeKey, usize> =
            self.nodes.keys().enumerate().map(|(i, k)| (k, i)).collect();
        for (key, i) in &ids {
            out.push_str(&format!("  N{i}[\"{}\"]\n", key.label().replace('"', "'")));
        }
        for (key, node) in &self.nodes {
            let from = ids[key];
            for dep in &node.strong_deps {
                out.push_str(&format!("  N{from} --> N{}\n", ids[dep]));
            }
            for dep in &node.weak_deps {
                out.push_str(&format!("  N{from} -.-> N{}\n", ids[dep]));
            }
            for dep in node.soft_deps.keys() {
                out.push_str(&format!("  N{from} -.soft.-> N{}\n", ids[dep]));
            }
        }
        out
    }
}

fn trace_cycle(remaining: &[usize], edges: &[Vec<usize>], keys: &[&NodeKey]) -> Vec<String> {
    let Some(&start) = remaining.first() else {
        return vec!["unknown".to_string()];
    };
    let remaining_set: BTreeSet<usize> = remaining.iter().copied().collect();
    let mut path = vec![start];
    let mut current = start;
    let mut visited = BTreeSet::new();
    loop {
        visited.insert(current);
        let next = edges[current]
            .iter()
            .copied()
            .find(|n| remaining_set.contains(n));
        match next {
            Some(n) if n == start => {
                path.push(n);
                break;
            }
            Some(n) if !visited.contains(&n) => {
                path.push(n);
                current = n;
            }
            _ => break,
        }
    }
    path.into_iter().map(|i| keys[i].id()).collect()
}
