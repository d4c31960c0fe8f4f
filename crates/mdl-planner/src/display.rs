//! Dry-run plan rendering: one line per node, annotated with its edge kind
//! and marked when more than one goal shares the node.

use std::collections::BTreeMap;

use mdl_graph::{Graph, NodeKey};

use crate::plan::Plan;

/// Render a dry-run plan listing. Each line shows the node's position, its
/// label, and `(⏬N ctx)` when the node is shared by more than one
/// dependent (the planner unified it across call sites).
pub fn render_plan(graph: &Graph, plan: &Plan) -> String {
    let mut incoming: BTreeMap<&NodeKey, usize> = BTreeMap::new();
    for node in graph.nodes.values() {
        for dep in node.all_deps() {
            *incoming.entry(dep).or_insert(0) += 1;
        }
    }

    let mut out = String::new();
    out.push_str(&format!("Plan ({} node(s)):\n", plan.order.len()));
    for (index, key) in plan.order.iter().enumerate() {
        let shared = incoming.get(key).copied().unwrap_or(0) > 1;
        let marker = if shared {
            format!(" (\u{23ec}{} {})", incoming[key], key.context.label())
        } else {
            String::new()
        };
        out.push_str(&format!("  {}. {}{}\n", index + 1, key.label(), marker));
    }

    if !plan.soft_watches.is_empty() {
        out.push_str("Soft edges awaiting retain signal:\n");
        for watch in &plan.soft_watches {
            out.push_str(&format!(
                "  {} -(via {})-> {}\n",
                watch.target.label(),
                watch.retainer.label(),
                watch.target.label()
            ));
        }
    }

    out
}
