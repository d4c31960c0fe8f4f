//! Version selection: choosing the `ActionVersion` a node binds to within a context.

use mdl_core::{ActionDefinition, ActionVersion, Condition, Context, ValidationIssue};

/// Select the version of `action` that matches `context`, per invariant 2:
/// the version satisfying all conditions with maximal condition count; ties
/// are errors.
pub fn select_version<'a>(
    action: &'a ActionDefinition,
    context: &Context,
    host_platform: &str,
) -> Result<&'a ActionVersion, ValidationIssue> {
    let satisfying: Vec<&ActionVersion> = action
        .versions
        .iter()
        .filter(|v| v.satisfies(context, host_platform))
        .collect();

    if satisfying.is_empty() {
        if let Some(axis) = missing_required_axis(action, context) {
            return Err(ValidationIssue::MissingRequiredAxis {
                action: action.name.clone(),
                axis,
            });
        }
        return Err(ValidationIssue::NoMatchingVersion {
            action: action.name.clone(),
            context: context.label(),
        });
    }

    let max_conditions = satisfying
        .iter()
        .map(|v| v.condition_count())
        .max()
        .unwrap_or(0);
    let winners: Vec<&ActionVersion> = satisfying
        .into_iter()
        .filter(|v| v.condition_count() == max_conditions)
        .collect();

    match winners.len() {
        1 => Ok(winners[0]),
        count => Err(ValidationIssue::AmbiguousVersion {
            action: action.name.clone(),
            context: context.label(),
            count,
        }),
    }
}

/// When a multi-version action has no satisfying version, tell "no binding
/// and no default for an axis a version conditions on" (the context simply
/// lacks that axis) apart from "bound to a value no version accepts". Since
/// `context` already has axis defaults and CLI bindings layered in by the
/// time selection runs, an axis absent here has neither.
fn missing_required_axis(action: &ActionDefinition, context: &Context) -> Option<String> {
    if action.versions.len() <= 1 {
        return None;
    }
    action.versions.iter().find_map(|v| {
        v.conditions.iter().find_map(|c| match c {
            Condition::Axis { name, .. } if context.get(name).is_none() => Some(name.clone()),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_core::{Condition, Language};

    fn version(conditions: Vec<Condition>) -> ActionVersion {
        ActionVersion {
            script: "echo hi".into(),
            language: Language::Bash,
            conditions,
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

    #[test]
    fn selects_version_with_maximal_condition_count() {
        let action = ActionDefinition {
            name: "build".into(),
            description: String::new(),
            required_env: vec![],
            versions: vec![
                version(vec![]),
                version(vec![Condition::Axis {
                    name: "build-mode".into(),
                    value: "release".into(),
                }]),
            ],
        };
        let mut ctx = Context::new();
        ctx.insert("build-mode", "release");
        let selected = select_version(&action, &ctx, "linux").unwrap();
        assert_eq!(selected.condition_count(), 1);
    }

    #[test]
    fn no_matching_version_is_an_error() {
        let action = ActionDefinition {
            name: "build".into(),
            description: String::new(),
            required_env: vec![],
            versions: vec![version(vec![Condition::Axis {
                name: "build-mode".into(),
                value: "release".into(),
            }])],
        };
        let ctx = Context::new();
        let err = select_version(&action, &ctx, "linux").unwrap_err();
        assert!(matches!(err, ValidationIssue::NoMatchingVersion { .. }));
    }

    #[test]
    fn unbound_axis_on_multi_version_action_is_missing_required_axis() {
        let action = ActionDefinition {
            name: "build".into(),
            description: String::new(),
            required_env: vec![],
            versions: vec![
                version(vec![Condition::Axis {
                    name: "build-mode".into(),
                    value: "release".into(),
                }]),
                version(vec![Condition::Axis {
                    name: "build-mode".into(),
                    value: "debug".into(),
                }]),
            ],
        };
        let ctx = Context::new();
        let err = select_version(&action, &ctx, "linux").unwrap_err();
        match err {
            ValidationIssue::MissingRequiredAxis { axis, .. } => assert_eq!(axis, "build-mode"),
            other => panic!("expected MissingRequiredAxis, got {other:?}"),
        }
    }

    #[test]
    fn tied_condition_counts_are_ambiguous() {
        let action = ActionDefinition {
            name: "build".into(),
            description: String::new(),
            required_env: vec![],
            versions: vec![
                version(vec![Condition::Platform {
                    value: "linux".into(),
                }]),
                version(vec![Condition::Axis {
                    name: "build-mode".into(),
                    value: "release".into(),
                }]),
            ],
        };
        let mut ctx = Context::new();
        ctx.insert("build-mode", "release");
        let err = select_version(&action, &ctx, "linux").unwrap_err();
        assert!(matches!(err, ValidationIssue::AmbiguousVersion { .. }));
    }
}
