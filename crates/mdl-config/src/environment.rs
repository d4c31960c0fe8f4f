//! The environment contract (§6): which variables a script may reference
//! via `${env.*}`/`dep env.X`, and the resolved values handed to the
//! expansion evaluator and, ultimately, the command wrapper.
//!
//! A variable counts as *available* only when it is both declared (in the
//! document's `environment`/`passthrough` blocks, or an action's own
//! `required_env`) and actually present in the parent process's
//! environment — declaring a name the process never set is still a
//! validation-time "missing env", matching §4.3.

use std::collections::{BTreeMap, BTreeSet};

use mdl_core::Document;

/// Every variable name any action or the document declares as part of the
/// environment contract.
pub fn declared_names(document: &Document) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = document
        .environment
        .exported
        .iter()
        .chain(document.environment.passthrough.iter())
        .cloned()
        .collect();
    for action in &document.actions {
        names.extend(action.required_env.iter().cloned());
    }
    names
}

/// Declared names that are also present in the parent process's
/// environment — the set the validator checks `${env.*}` expansions
/// against.
pub fn available_env(document: &Document, process_env: &BTreeMap<String, String>) -> BTreeSet<String> {
    declared_names(document)
        .into_iter()
        .filter(|name| process_env.contains_key(name))
        .collect()
}

/// The resolved `${env.*}` binding environment: declared names mapped to
/// their process value.
pub fn resolve_env_values(
    document: &Document,
    process_env: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    declared_names(document)
        .into_iter()
        .filter_map(|name| process_env.get(&name).map(|v| (name, v.clone())))
        .collect()
}
