//! Aggregated, whole-graph validation: every issue is collected rather than
//! failing fast on the first one, so a document with several independent
//! problems reports them all in a single pass.

use std::collections::{BTreeMap, BTreeSet};

use mdl_core::{AxisDefinition, Condition, Expansion, ValidationIssue};

use crate::graph::Graph;
use crate::key::NodeKey;

/// The CLI-supplied inputs a validation pass checks expansions against.
pub struct ValidationInputs<'a> {
    pub axes: &'a [AxisDefinition],
    pub args: &'a BTreeMap<String, String>,
    pub available_env: &'a BTreeSet<String>,
}

/// Validate a built graph, returning every issue found.
pub fn validate(graph: &Graph, inputs: &ValidationInputs) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(cycle) = graph.cycle() {
        issues.push(cycle);
    }

    let retainers: BTreeSet<&NodeKey> = graph
        .nodes
        .values()
        .flat_map(|n| n.soft_deps.values())
        .collect();

    for node in graph.nodes.values() {
        for condition in &node.version.conditions {
            if let Condition::Axis { name, value } = condition {
                match inputs.axes.iter().find(|a| &a.name == name) {
                    None => issues.push(ValidationIssue::UnknownAxis { name: name.clone() }),
                    Some(axis) if !axis.allows(value) => {
                        issues.push(ValidationIssue::InvalidAxisValue {
                            axis: name.clone(),
                            value: value.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        for (axis_name, _) in node.key.context.iter() {
            if inputs.axes.iter().find(|a| &a.name == axis_name).is_none() {
                issues.push(ValidationIssue::UnknownAxis {
                    name: axis_name.clone(),
                });
            }
        }

        for expansion in &node.version.expansions {
            match expansion {
                Expansion::Args { name } => {
                    let defn = node.version.args.iter().find(|a| &a.name == name);
                    match defn {
                        None => issues.push(ValidationIssue::MissingArgument {
                            action: node.key.action.clone(),
                            arg: name.clone(),
                        }),
                        Some(d) if d.is_mandatory() && !inputs.args.contains_key(name) => {
                            issues.push(ValidationIssue::MissingArgument {
                                action: node.key.action.clone(),
                                arg: name.clone(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                Expansion::Flags { name } => {
                    if node.version.flags.iter().find(|f| &f.name == name).is_none() {
                        issues.push(ValidationIssue::MissingFlag {
                            action: node.key.action.clone(),
                            flag: name.clone(),
                        });
                    }
                }
                Expansion::Env { name } => {
                    if !inputs.available_env.contains(name) {
                        issues.push(ValidationIssue::MissingEnv { var: name.clone() });
                    }
                }
                Expansion::ActionStrong { action, ret } => {
                    let resolved = node.strong_deps.iter().find(|k| &k.action == action);
                    if let Some(dep_key) = resolved {
                        if let Some(dep_node) = graph.node(dep_key) {
                            if dep_node.version.return_type(ret).is_none() {
                                issues.push(ValidationIssue::MissingOutput {
                                    action: action.clone(),
                                    ret: ret.clone(),
                                });
                            }
                        }
                    }
                }
                // Weak references are not required to resolve; retained
                // checks are deferred to the executor (see spec §4.5/§4.6).
                Expansion::ActionWeak { .. } | Expansion::Retained { .. } | Expansion::System { .. } => {}
            }
        }

        for env_var in &node.version.env_deps {
            if !inputs.available_env.contains(env_var) {
                issues.push(ValidationIssue::MissingEnv {
                    var: env_var.clone(),
                });
            }
        }

        if retainers.contains(&node.key)
            && (!node.version.weak_deps.is_empty() || !node.version.soft_deps.is_empty())
        {
            issues.push(ValidationIssue::RetainerHasWeakOrSoftDeps {
                retainer: node.key.action.clone(),
            });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_context::select_version;
    use mdl_core::{ActionDefinition, ActionVersion, ArgumentDefinition, Context, Document, Language, ValueType};

    fn doc_with_missing_arg() -> Document {
        Document {
            actions: vec![ActionDefinition {
                name: "build".into(),
                description: String::new(),
                required_env: vec![],
                versions: vec![ActionVersion {
                    script: "echo ${args.name}".into(),
                    language: Language::Bash,
                    conditions: vec![],
                    expansions: vec![Expansion::Args { name: "name".into() }],
                    returns: vec![],
                    strong_deps: vec![],
                    weak_deps: vec![],
                    soft_deps: vec![],
                    env_deps: vec![],
                    args: vec![ArgumentDefinition {
                        name: "name".into(),
                        ty: ValueType::String,
                        default: None,
                    }],
                    flags: vec![],
                }],
            }],
            axes: vec![],
            environment: Default::default(),
        }
    }

    fn single_node_graph(document: &Document) -> Graph {
        let action = document.find_action("build").unwrap();
        let version = select_version(action, &Context::new(), "linux").unwrap().clone();
        let key = NodeKey::new("build", Context::new());
        let mut graph = Graph::default();
        graph.nodes.insert(
            key.clone(),
            crate::graph::GraphNode {
                key,
                version,
                strong_deps: Default::default(),
                weak_deps: Default::default(),
                soft_deps: Default::default(),
            },
        );
        graph
    }

    #[test]
    fn mandatory_arg_without_cli_binding_is_missing() {
        let document = doc_with_missing_arg();
        let graph = single_node_graph(&document);
        let inputs = ValidationInputs {
            axes: &[],
            args: &BTreeMap::new(),
            available_env: &BTreeSet::new(),
        };
        let issues = validate(&graph, &inputs);
        assert!(issues.iter().any(|i| matches!(i, ValidationIssue::MissingArgument { .. })));
    }

    #[test]
    fn mandatory_arg_with_cli_binding_is_fine() {
        let document = doc_with_missing_arg();
        let graph = single_node_graph(&document);
        let mut args = BTreeMap::new();
        args.insert("name".to_string(), "world".to_string());
        let inputs = ValidationInputs {
            axes: &[],
            args: &args,
            available_env: &BTreeSet::new(),
        };
        let issues = validate(&graph, &inputs);
        assert!(issues.is_empty());
    }
}
