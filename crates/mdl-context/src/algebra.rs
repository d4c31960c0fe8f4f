//! Context algebra: building, reducing, and unifying axis-valued contexts.
//!
//! Follows a CLI-over-config precedence (global config < project config <
//! CLI flags): here, the default axis context is layered under CLI global
//! bindings, which are in turn layered under per-invocation bindings.

use std::collections::BTreeSet;

use mdl_core::{AxisDefinition, Context, MdlError};

/// Build the default context: the union of the default value of every declared axis.
pub fn default_context(axes: &[AxisDefinition]) -> Context {
    let mut ctx = Context::new();
    for axis in axes {
        if let Some(default) = &axis.default {
            ctx.insert(axis.name.clone(), default.clone());
        }
    }
    ctx
}

/// Layer a CLI context: global bindings first, per-invocation bindings win.
pub fn layer_cli_context(base: &Context, global: &Context, per_invocation: &Context) -> Context {
    base.layered_over(global).layered_over(per_invocation)
}

/// One binding as parsed off the CLI: possibly a wildcard pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBinding {
    pub axis: String,
    pub pattern: String,
}

/// Expand wildcard bindings into the Cartesian product of concrete contexts.
///
/// - `*` expands to every allowed value of the axis.
/// - `prefix*` expands to the subset of allowed values starting with `prefix`.
/// - An empty expansion fails with [`MdlError::EmptyWildcard`].
/// - Concrete (non-wildcard) bindings are preserved on every child context.
pub fn expand_wildcards(
    bindings: &[RawBinding],
    axes: &[AxisDefinition],
) -> Result<Vec<Context>, MdlError> {
    let mut product: Vec<Context> = vec![Context::new()];

    for binding in bindings {
        let values = resolve_binding_values(binding, axes)?;
        let mut next = Vec::with_capacity(product.len() * values.len());
        for ctx in &product {
            for value in &values {
                let mut child = ctx.clone();
                child.insert(binding.axis.clone(), value.clone());
                next.push(child);
            }
        }
        product = next;
    }

    Ok(product)
}

fn resolve_binding_values(
    binding: &RawBinding,
    axes: &[AxisDefinition],
) -> Result<Vec<String>, MdlError> {
    let is_wildcard = binding.pattern.contains('*');
    if !is_wildcard {
        return Ok(vec![binding.pattern.clone()]);
    }

    let axis_def = axes.iter().find(|a| a.name == binding.axis);
    let allowed: &[String] = axis_def.map(|a| a.values.as_slice()).unwrap_or(&[]);

    let matches: Vec<String> = if binding.pattern == "*" {
        allowed.to_vec()
    } else if let Some(prefix) = binding.pattern.strip_suffix('*') {
        allowed
            .iter()
            .filter(|v| v.starts_with(prefix))
            .cloned()
            .collect()
    } else {
        // wildcard appears but not as a trailing `*` — treat as a literal,
        // exact-match pattern (no matches unless an allowed value equals it).
        allowed
            .iter()
            .filter(|v| v.as_str() == binding.pattern)
            .cloned()
            .collect()
    };

    if matches.is_empty() {
        return Err(MdlError::EmptyWildcard {
            axis: binding.axis.clone(),
            pattern: binding.pattern.clone(),
        });
    }

    Ok(matches)
}

/// Reduce a context to the given axis footprint; nodes with an empty
/// footprint collapse to the single "global" context.
pub fn reduce_to_footprint(context: &Context, footprint: &BTreeSet<String>) -> Context {
    context.restrict(footprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_core::AxisDefinition;

    fn axes() -> Vec<AxisDefinition> {
        vec![AxisDefinition {
            name: "build-mode".into(),
            values: vec!["release".into(), "development".into(), "debug".into()],
            default: Some("development".into()),
        }]
    }

    #[test]
    fn default_context_uses_axis_defaults() {
        let ctx = default_context(&axes());
        assert_eq!(ctx.get("build-mode"), Some("development"));
    }

    #[test]
    fn per_invocation_wins_over_global() {
        let base = Context::new();
        let mut global = Context::new();
        global.insert("build-mode", "development");
        let mut per_invocation = Context::new();
        per_invocation.insert("build-mode", "release");

        let merged = layer_cli_context(&base, &global, &per_invocation);
        assert_eq!(merged.get("build-mode"), Some("release"));
    }

    #[test]
    fn wildcard_star_expands_to_all_allowed_values() {
        let bindings = vec![RawBinding {
            axis: "build-mode".into(),
            pattern: "*".into(),
        }];
        let expanded = expand_wildcards(&bindings, &axes()).unwrap();
        assert_eq!(expanded.len(), 3);
    }

    #[test]
    fn wildcard_prefix_expands_to_matching_subset() {
        let bindings = vec![RawBinding {
            axis: "build-mode".into(),
            pattern: "de*".into(),
        }];
        let expanded = expand_wildcards(&bindings, &axes()).unwrap();
        assert_eq!(expanded.len(), 2);
        assert!(
            expanded
                .iter()
                .all(|c| c.get("build-mode").unwrap().starts_with("de"))
        );
    }

    #[test]
    fn wildcard_with_no_matches_errors() {
        let bindings = vec![RawBinding {
            axis: "build-mode".into(),
            pattern: "zzz*".into(),
        }];
        let err = expand_wildcards(&bindings, &axes()).unwrap_err();
        assert!(matches!(err, MdlError::EmptyWildcard { .. }));
    }

    #[test]
    fn cartesian_product_over_multiple_wildcard_axes() {
        let axes = vec![
            AxisDefinition {
                name: "build-mode".into(),
                values: vec!["release".into(), "debug".into()],
                default: None,
            },
            AxisDefinition {
                name: "arch".into(),
                values: vec!["x86_64".into(), "arm64".into()],
                default: None,
            },
        ];
        let bindings = vec![
            RawBinding {
                axis: "build-mode".into(),
                pattern: "*".into(),
            },
            RawBinding {
                axis: "arch".into(),
                pattern: "*".into(),
            },
        ];
        let expanded = expand_wildcards(&bindings, &axes).unwrap();
        assert_eq!(expanded.len(), 4);
    }

    #[test]
    fn reduce_to_footprint_drops_unreferenced_axes() {
        let mut ctx = Context::new();
        ctx.insert("build-mode", "release");
        ctx.insert("arch", "arm64");
        let footprint = BTreeSet::from(["build-mode".to_string()]);
        let reduced = reduce_to_footprint(&ctx, &footprint);
        assert_eq!(reduced.get("build-mode"), Some("release"));
        assert_eq!(reduced.get("arch"), None);
    }
}
