//! Global-vs-per-invocation CLI layering inputs (§6 grammar), handed off to
//! `mdl-context`'s wildcard expansion and context algebra.
//!
//! Tokenizing `argv` into these structures is the CLI crate's job (clap);
//! this module only owns what happens to the *parsed* bindings once they
//! exist — merging a goal's local overrides on top of the global ones and
//! producing the concrete, wildcard-expanded contexts for that goal.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use mdl_context::RawBinding;
use mdl_core::{AxisDefinition, Context, MdlError};

const AXIS_FLAG_NAMES: [&str; 4] = ["--axis", "-u", "-a", "--use"];

/// One `:goal` segment's CLI-supplied bindings, after the global layer has
/// already been folded in by [`merge_bindings`]/[`merge_values`].
#[derive(Clone, Debug, Default)]
pub struct GoalInvocation {
    pub goal: String,
    pub axis_bindings: Vec<RawBinding>,
    pub args: BTreeMap<String, String>,
    pub flags: BTreeMap<String, bool>,
}

/// Merge global and per-invocation axis bindings: a per-invocation binding
/// for an axis replaces the global one for that same axis rather than
/// stacking (only one pattern per axis makes sense per invocation).
pub fn merge_bindings(global: &[RawBinding], per_invocation: &[RawBinding]) -> Vec<RawBinding> {
    let mut merged: BTreeMap<String, RawBinding> = global
        .iter()
        .map(|b| (b.axis.clone(), b.clone()))
        .collect();
    for binding in per_invocation {
        merged.insert(binding.axis.clone(), binding.clone());
    }
    merged.into_values().collect()
}

/// Merge global and per-invocation key/value maps (args or flags):
/// per-invocation wins.
pub fn merge_values<V: Clone>(
    global: &BTreeMap<String, V>,
    per_invocation: &BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    let mut merged = global.clone();
    merged.extend(per_invocation.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Expand one goal's merged axis bindings into the Cartesian product of
/// concrete contexts, layered over the axis defaults.
pub fn expand_goal_contexts(
    bindings: &[RawBinding],
    axes: &[AxisDefinition],
) -> Result<Vec<Context>, MdlError> {
    let default = mdl_context::default_context(axes);
    let expanded = mdl_context::expand_wildcards(bindings, axes)?;
    Ok(expanded
        .into_iter()
        .map(|concrete| mdl_context::layer_cli_context(&default, &Context::new(), &concrete))
        .collect())
}

/// The global prefix plus every `:goal` segment parsed out of the dynamic
/// tail of the command line (everything clap's fixed flags don't own —
/// `--axis`/`-u`/`-a`/`--use`, `--<arg>=<value>`, `--<flag>`, `:goal`).
#[derive(Clone, Debug, Default)]
pub struct ParsedInvocation {
    pub global_axis: Vec<RawBinding>,
    pub global_args: BTreeMap<String, String>,
    pub global_flags: BTreeMap<String, bool>,
    pub goals: Vec<GoalInvocation>,
}

/// Hand-tokenize the dynamic tail of the grammar in §6: `[<global-axis|
/// global-arg|global-flag>]* (:goal [<local-axis|local-arg|local-flag>]*)*`.
///
/// Recognized fixed-name global options (`--defs`, `--dry-run`, …) are
/// parsed by `clap` ahead of this and never reach `tokens`; axis/arg/flag
/// names here are open-ended (the document defines them), so they cannot be
/// declared statically and are tokenized directly against the grammar.
pub fn parse_segments(tokens: &[String]) -> Result<ParsedInvocation> {
    let mut parsed = ParsedInvocation::default();
    let mut current_goal: Option<GoalInvocation> = None;
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if let Some(goal_name) = token.strip_prefix(':') {
            if let Some(goal) = current_goal.take() {
                parsed.goals.push(goal);
            }
            current_goal = Some(GoalInvocation {
                goal: goal_name.to_string(),
                ..GoalInvocation::default()
            });
            i += 1;
            continue;
        }

        if AXIS_FLAG_NAMES.contains(&token.as_str()) {
            let Some(value) = tokens.get(i + 1) else {
                bail!("'{token}' requires an <axis-name>:<value|pattern> argument");
            };
            let Some((axis, pattern)) = value.split_once(':') else {
                bail!("invalid axis binding '{value}': expected <name>:<value|pattern>");
            };
            let binding = RawBinding {
                axis: axis.to_string(),
                pattern: pattern.to_string(),
            };
            match &mut current_goal {
                Some(goal) => goal.axis_bindings.push(binding),
                None => parsed.global_axis.push(binding),
            }
            i += 2;
            continue;
        }

        let Some(name) = token.strip_prefix("--") else {
            bail!("unexpected token '{token}' in CLI invocation");
        };
        if let Some((arg_name, value)) = name.split_once('=') {
            match &mut current_goal {
                Some(goal) => {
                    goal.args.insert(arg_name.to_string(), value.to_string());
                }
                None => {
                    parsed.global_args.insert(arg_name.to_string(), value.to_string());
                }
            }
        } else {
            match &mut current_goal {
                Some(goal) => {
                    goal.flags.insert(name.to_string(), true);
                }
                None => {
                    parsed.global_flags.insert(name.to_string(), true);
                }
            }
        }
        i += 1;
    }
    if let Some(goal) = current_goal.take() {
        parsed.goals.push(goal);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes() -> Vec<AxisDefinition> {
        vec![AxisDefinition {
            name: "build-mode".into(),
            values: vec!["release".into(), "development".into()],
            default: Some("development".into()),
        }]
    }

    #[test]
    fn per_invocation_binding_replaces_global_for_same_axis() {
        let global = vec![RawBinding {
            axis: "build-mode".into(),
            pattern: "development".into(),
        }];
        let local = vec![RawBinding {
            axis: "build-mode".into(),
            pattern: "release".into(),
        }];
        let merged = merge_bindings(&global, &local);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pattern, "release");
    }

    #[test]
    fn expand_goal_contexts_falls_back_to_axis_default() {
        let contexts = expand_goal_contexts(&[], &axes()).unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].get("build-mode"), Some("development"));
    }

    #[test]
    fn expand_goal_contexts_honors_wildcard() {
        let bindings = vec![RawBinding {
            axis: "build-mode".into(),
            pattern: "*".into(),
        }];
        let contexts = expand_goal_contexts(&bindings, &axes()).unwrap();
        assert_eq!(contexts.len(), 2);
    }

    fn tok(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn global_options_precede_first_goal() {
        let tokens = vec![tok("--axis"), tok("build-mode:release"), tok("--verbose")];
        let parsed = parse_segments(&tokens).unwrap();
        assert_eq!(parsed.global_axis.len(), 1);
        assert_eq!(parsed.global_axis[0].axis, "build-mode");
        assert_eq!(parsed.global_axis[0].pattern, "release");
        assert_eq!(parsed.global_flags.get("verbose"), Some(&true));
        assert!(parsed.goals.is_empty());
    }

    #[test]
    fn goal_segments_collect_local_bindings() {
        let tokens = vec![
            tok(":build"),
            tok("--use"),
            tok("target:linux"),
            tok("--retries=3"),
            tok("--force"),
            tok(":test"),
            tok("-a"),
            tok("target:*"),
        ];
        let parsed = parse_segments(&tokens).unwrap();
        assert_eq!(parsed.goals.len(), 2);

        let build = &parsed.goals[0];
        assert_eq!(build.goal, "build");
        assert_eq!(build.axis_bindings[0].pattern, "linux");
        assert_eq!(build.args.get("retries"), Some(&"3".to_string()));
        assert_eq!(build.flags.get("force"), Some(&true));

        let test = &parsed.goals[1];
        assert_eq!(test.goal, "test");
        assert_eq!(test.axis_bindings[0].pattern, "*");
    }

    #[test]
    fn axis_flag_without_value_is_an_error() {
        let tokens = vec![tok("--axis")];
        assert!(parse_segments(&tokens).is_err());
    }

    #[test]
    fn malformed_axis_binding_is_an_error() {
        let tokens = vec![tok("--axis"), tok("no-colon-here")];
        assert!(parse_segments(&tokens).is_err());
    }

    #[test]
    fn token_without_dashes_or_colon_is_an_error() {
        let tokens = vec![tok("nonsense")];
        assert!(parse_segments(&tokens).is_err());
    }
}
