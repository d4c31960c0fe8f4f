//! `--list-actions` and `--autocomplete` output: static introspection of a
//! loaded document, with no graph building or execution involved.

use mdl_core::Document;

/// Render every action's name, description, dependencies, and returns.
pub fn render_actions(document: &Document) -> String {
    let mut out = String::new();
    for action in &document.actions {
        out.push_str(&format!("{}\n", action.name));
        if !action.description.is_empty() {
            out.push_str(&format!("  {}\n", action.description));
        }
        for (i, version) in action.versions.iter().enumerate() {
            out.push_str(&format!("  version {i}:\n"));
            if !version.strong_deps.is_empty() {
                out.push_str(&format!("    strong deps: {}\n", version.strong_deps.join(", ")));
            }
            if !version.weak_deps.is_empty() {
                out.push_str(&format!("    weak deps: {}\n", version.weak_deps.join(", ")));
            }
            if !version.soft_deps.is_empty() {
                let soft: Vec<String> = version
                    .soft_deps
                    .iter()
                    .map(|s| format!("{} (via {})", s.target, s.retainer))
                    .collect();
                out.push_str(&format!("    soft deps: {}\n", soft.join(", ")));
            }
            if !version.returns.is_empty() {
                let returns: Vec<String> = version
                    .returns
                    .iter()
                    .map(|r| format!("{}:{}", r.name, r.ty))
                    .collect();
                out.push_str(&format!("    returns: {}\n", returns.join(", ")));
            }
        }
    }
    out
}

/// Resolve one `--autocomplete <source>` request to the newline-separated
/// data clap-generated shell completion scripts are expected to feed on.
pub fn render_autocomplete(
    document: &Document,
    source: &str,
    axis_name: Option<&str>,
) -> anyhow::Result<String> {
    match source {
        "actions" => Ok(document
            .actions
            .iter()
            .map(|a| a.name.clone())
            .collect::<Vec<_>>()
            .join("\n")),
        "flags" => {
            let mut names: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
            for action in &document.actions {
                for version in &action.versions {
                    names.extend(version.flags.iter().map(|f| f.name.clone()));
                }
            }
            Ok(names.into_iter().collect::<Vec<_>>().join("\n"))
        }
        "axis-names" => Ok(document
            .axes
            .iter()
            .map(|a| a.name.clone())
            .collect::<Vec<_>>()
            .join("\n")),
        "axis-values" => {
            let name = axis_name
                .ok_or_else(|| anyhow::anyhow!("--autocomplete=axis-values requires --autocomplete-axis"))?;
            let axis = document
                .find_axis(name)
                .ok_or_else(|| anyhow::anyhow!("unknown axis '{name}'"))?;
            Ok(axis.values.join("\n"))
        }
        other => anyhow::bail!("unknown --autocomplete source '{other}'"),
    }
}
