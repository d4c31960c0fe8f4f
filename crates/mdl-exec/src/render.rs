//! Per-node script rendering: expansion substitution plus the language
//! preamble, producing the exact text written to `script.sh` / `script.py`.

use std::collections::BTreeMap;
use std::path::Path;

use mdl_context::{BindingEnvironment, SystemInfo, render_script};
use mdl_core::{ActionOutputs, Language};
use serde_json::json;

use crate::runtime::{bash_preamble, python_preamble};

/// Everything the renderer needs about the rest of the run to resolve a
/// node's expansions; owned by the scheduler and assembled fresh per node.
pub struct RenderInputs<'a> {
    pub system: &'a SystemInfo,
    pub env: &'a BTreeMap<String, String>,
    pub args: &'a BTreeMap<String, String>,
    pub flags: &'a BTreeMap<String, bool>,
    pub strong_outputs: &'a BTreeMap<String, ActionOutputs>,
    pub weak_outputs: &'a BTreeMap<String, ActionOutputs>,
    pub retained: &'a BTreeMap<String, bool>,
}

/// The rendered artifact for one node: final script text, file extension,
/// and — for Python — the side-channel context JSON the `mdl` surface loads.
pub struct RenderedScript {
    pub text: String,
    pub extension: &'static str,
    pub context_json: Option<String>,
}

/// Render `script`, substituting `${…}` references, then prepend the
/// language-appropriate runtime preamble.
pub fn render_node_script(
    script: &str,
    language: Language,
    inputs: &RenderInputs,
    output_json: &Path,
    retain_flag: &Path,
    context_json_path: &Path,
) -> RenderedScript {
    let binding = BindingEnvironment {
        system: inputs.system,
        env: inputs.env,
        args: inputs.args,
        flags: inputs.flags,
        strong_outputs: inputs.strong_outputs,
        weak_outputs: inputs.weak_outputs,
        retained: inputs.retained,
    };
    let body = render_script(script, &binding);

    match language {
        Language::Bash => RenderedScript {
            text: format!("{}\n{}\n", bash_preamble(output_json, retain_flag), body),
            extension: "sh",
            context_json: None,
        },
        Language::Python => {
            let preamble = python_preamble(output_json, retain_flag, context_json_path);
            let context = build_python_context(inputs);
            RenderedScript {
                text: format!("{preamble}\n{body}\n"),
                extension: "py",
                context_json: Some(context.to_string()),
            }
        }
    }
}

fn build_python_context(inputs: &RenderInputs) -> serde_json::Value {
    let actions: BTreeMap<String, serde_json::Value> = inputs
        .strong_outputs
        .iter()
        .chain(inputs.weak_outputs.iter())
        .map(|(action, outputs)| {
            let rendered: BTreeMap<String, serde_json::Value> = outputs
                .iter()
                .map(|(name, value)| (name.clone(), value.as_json_value()))
                .collect();
            (action.clone(), json!(rendered))
        })
        .collect();

    json!({
        "system": { "os": inputs.system.os, "arch": inputs.system.arch },
        "env": inputs.env,
        "args": inputs.args,
        "flags": inputs.flags,
        "actions": actions,
        "retained": inputs.retained,
    })
}
