//! Expansion evaluator: substitutes `${…}` references inside scripts using a
//! resolved binding environment.

use std::collections::BTreeMap;

use mdl_core::{ActionOutputs, Expansion};

/// Host system facts exposed under `${system.*}`.
#[derive(Clone, Debug)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        match name {
            "os" => Some(self.os.clone()),
            "arch" => Some(self.arch.clone()),
            _ => None,
        }
    }
}

/// The resolved binding environment a node's script is rendered against.
pub struct BindingEnvironment<'a> {
    pub system: &'a SystemInfo,
    pub env: &'a BTreeMap<String, String>,
    pub args: &'a BTreeMap<String, String>,
    pub flags: &'a BTreeMap<String, bool>,
    /// Outputs of finished strong ancestors, keyed by action name.
    pub strong_outputs: &'a BTreeMap<String, ActionOutputs>,
    /// Outputs of weak dependencies that turned out to execute, keyed by action name.
    pub weak_outputs: &'a BTreeMap<String, ActionOutputs>,
    /// Whether a weak/soft target was promoted into the executable plan and
    /// will (or did) produce outputs — drives `${retained.weak.X}` / `${retained.soft.X}`.
    pub retained: &'a BTreeMap<String, bool>,
}

/// Render a script, substituting every `${…}` reference found.
///
/// Unresolved weak references resolve to the empty string; resolution never
/// fails — an expansion that cannot be resolved is a validation-time error,
/// not a render-time one (see `mdl-graph`'s validator).
pub fn render_script(script: &str, env: &BindingEnvironment) -> String {
    let mut out = String::with_capacity(script.len());
    let bytes = script.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = script[i + 2..].find('}') {
                let token = &script[i + 2..i + 2 + end];
                out.push_str(&resolve_token(token, env));
                i += 2 + end + 1;
                continue;
            }
        }
        // Safe: we only ever restart at ASCII-boundary offsets above; for the
        // general case fall back to char-wise iteration.
        let ch = script[i..].chars().next().unwrap_or('\u{0}');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Parse and resolve one `${…}` token (without the surrounding braces).
fn resolve_token(token: &str, env: &BindingEnvironment) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        ["system", name] => env.system.get(name).unwrap_or_default(),
        ["env", name] => env.env.get(*name).cloned().unwrap_or_default(),
        ["args", name] => env.args.get(*name).cloned().unwrap_or_default(),
        ["flags", name] => env
            .flags
            .get(*name)
            .map(|b| b.to_string())
            .unwrap_or_else(|| "false".to_string()),
        ["action", "strong", action, ret] => env
            .strong_outputs
            .get(*action)
            .and_then(|outputs| outputs.get(*ret))
            .map(|v| v.as_json_value().as_str().map(str::to_string).unwrap_or_else(|| v.as_json_value().to_string()))
            .unwrap_or_default(),
        ["action", "weak", action, ret] => env
            .weak_outputs
            .get(*action)
            .and_then(|outputs| outputs.get(*ret))
            .map(|v| v.as_json_value().as_str().map(str::to_string).unwrap_or_else(|| v.as_json_value().to_string()))
            .unwrap_or_default(),
        ["retained", "weak", action] | ["retained", "soft", action] => {
            if env.retained.get(*action).copied().unwrap_or(false) {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        _ => String::new(),
    }
}

/// Classify a raw `${…}` token (without braces) into an [`Expansion`], for
/// use by validators that need to know what a script references without
/// rendering it.
pub fn classify_token(token: &str) -> Option<Expansion> {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        ["system", name] => Some(Expansion::System {
            name: (*name).to_string(),
        }),
        ["env", name] => Some(Expansion::Env {
            name: (*name).to_string(),
        }),
        ["args", name] => Some(Expansion::Args {
            name: (*name).to_string(),
        }),
        ["flags", name] => Some(Expansion::Flags {
            name: (*name).to_string(),
        }),
        ["action", "strong", action, ret] => Some(Expansion::ActionStrong {
            action: (*action).to_string(),
            ret: (*ret).to_string(),
        }),
        ["action", "weak", action, ret] => Some(Expansion::ActionWeak {
            action: (*action).to_string(),
            ret: (*ret).to_string(),
        }),
        ["retained", "weak", action] | ["retained", "soft", action] => Some(Expansion::Retained {
            action: (*action).to_string(),
        }),
        _ => None,
    }
}

/// Scan a script for every `${…}` token and classify each one.
///
/// Tokens that don't match a known tag are skipped — the front-end's own
/// extraction pass is the source of truth for an [`ActionVersion`]'s
/// `expansions` list; this helper exists for tests and tooling that need to
/// re-derive it from raw script text.
pub fn extract_expansions(script: &str) -> Vec<Expansion> {
    let mut found = Vec::new();
    let mut rest = script;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let token = &after[..end];
        if let Some(expansion) = classify_token(token) {
            found.push(expansion);
        }
        rest = &after[end + 1..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_fixture() -> (
        BTreeMap<String, String>,
        BTreeMap<String, String>,
        BTreeMap<String, bool>,
        BTreeMap<String, ActionOutputs>,
        BTreeMap<String, ActionOutputs>,
        BTreeMap<String, bool>,
    ) {
        (
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn renders_args_and_flags() {
        let (env_vars, mut args, mut flags, strong, weak, retained) = env_fixture();
        args.insert("name".into(), "world".into());
        flags.insert("verbose".into(), true);
        let system = SystemInfo {
            os: "linux".into(),
            arch: "x86_64".into(),
        };
        let binding = BindingEnvironment {
            system: &system,
            env: &env_vars,
            args: &args,
            flags: &flags,
            strong_outputs: &strong,
            weak_outputs: &weak,
            retained: &retained,
        };
        let rendered = render_script("hello ${args.name} verbose=${flags.verbose}", &binding);
        assert_eq!(rendered, "hello world verbose=true");
    }

    #[test]
    fn unresolved_weak_reference_is_empty_string() {
        let (env_vars, args, flags, strong, weak, retained) = env_fixture();
        let system = SystemInfo::detect();
        let binding = BindingEnvironment {
            system: &system,
            env: &env_vars,
            args: &args,
            flags: &flags,
            strong_outputs: &strong,
            weak_outputs: &weak,
            retained: &retained,
        };
        let rendered = render_script("val=[${action.weak.P.v}]", &binding);
        assert_eq!(rendered, "val=[]");
    }

    #[test]
    fn retained_resolves_to_one_or_zero() {
        let (env_vars, args, flags, strong, weak, mut retained) = env_fixture();
        retained.insert("R".into(), true);
        let system = SystemInfo::detect();
        let binding = BindingEnvironment {
            system: &system,
            env: &env_vars,
            args: &args,
            flags: &flags,
            strong_outputs: &strong,
            weak_outputs: &weak,
            retained: &retained,
        };
        assert_eq!(
            render_script("${retained.soft.R}", &binding),
            "1".to_string()
        );
        assert_eq!(
            render_script("${retained.weak.Missing}", &binding),
            "0".to_string()
        );
    }

    #[test]
    fn extract_expansions_classifies_known_tags() {
        let script = "echo ${args.name} ${action.strong.A.out} ${retained.soft.R}";
        let found = extract_expansions(script);
        assert_eq!(found.len(), 3);
        assert!(matches!(found[0], Expansion::Args { .. }));
        assert!(matches!(found[1], Expansion::ActionStrong { .. }));
        assert!(matches!(found[2], Expansion::Retained { .. }));
    }
}
