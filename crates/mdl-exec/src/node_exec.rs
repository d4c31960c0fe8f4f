//! Executing one already-rendered node: write the script, spawn the
//! interpreter, capture output, coerce and validate `output.json`, and
//! persist `meta.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use mdl_core::{ActionOutputs, MdlError, TypedValue, ValueType};
use mdl_process::{CaptureOptions, ConsoleEcho, ProcessSpec};
use mdl_store::{META_FILE_NAME, NodeMeta, OUTPUT_FILE_NAME, RETAIN_SENTINEL_FILE_NAME};
use mdl_core::ActionVersion;

use crate::render::RenderedScript;

/// Everything needed to run one node's process inside its own run directory.
pub struct NodeExecutionSpec<'a> {
    pub node_id: String,
    pub node_dir: PathBuf,
    pub version: &'a ActionVersion,
    pub rendered: RenderedScript,
    pub child_env: BTreeMap<String, String>,
    pub timeout: Duration,
    pub echo: ConsoleEcho,
}

/// Outcome of executing (or failing to execute) one node.
pub struct NodeExecutionOutcome {
    pub outputs: ActionOutputs,
    pub meta: NodeMeta,
}

/// Run one node to completion: write its script and context file, spawn the
/// interpreter, capture streams, and validate `output.json` against the
/// version's declared returns.
pub async fn execute_node(spec: NodeExecutionSpec<'_>) -> Result<NodeExecutionOutcome, MdlError> {
    std::fs::create_dir_all(&spec.node_dir).map_err(|e| MdlError::RunDirCreate {
        path: spec.node_dir.display().to_string(),
        source: e.to_string(),
    })?;

    let script_path = spec.node_dir.join(format!("script.{}", spec.rendered.extension));
    std::fs::write(&script_path, &spec.rendered.text).map_err(|e| MdlError::RunDirCreate {
        path: script_path.display().to_string(),
        source: e.to_string(),
    })?;

    let context_json_path = spec.node_dir.join("context.json");
    if let Some(context) = &spec.rendered.context_json {
        std::fs::write(&context_json_path, context).map_err(|e| MdlError::RunDirCreate {
            path: context_json_path.display().to_string(),
            source: e.to_string(),
        })?;
    }

    let output_json = spec.node_dir.join(OUTPUT_FILE_NAME);
    let retain_flag = spec.node_dir.join(RETAIN_SENTINEL_FILE_NAME);
    let program = interpreter_for(spec.version.language);

    let process_spec = ProcessSpec {
        program: program.to_string(),
        args: vec![script_path.display().to_string()],
        cwd: spec.node_dir.clone(),
        env: spec.child_env,
        stdin: None,
    };

    let start_time = Utc::now();
    let child = mdl_process::spawn(process_spec)
        .await
        .map_err(|e| MdlError::SpawnFailed {
            node: spec.node_id.clone(),
            source: e.to_string(),
        })?;

    let capture = CaptureOptions {
        stdout_log: spec.node_dir.join("stdout.log"),
        stderr_log: spec.node_dir.join("stderr.log"),
        idle_timeout: spec.timeout,
        echo: spec.echo,
        node_label: spec.node_id.clone(),
    };
    let result = mdl_process::wait_and_capture(child, &capture)
        .await
        .map_err(|e| MdlError::RuntimeFailure {
            node: spec.node_id.clone(),
            message: e.to_string(),
        })?;
    let end_time = Utc::now();
    let duration_seconds = (end_time - start_time).num_milliseconds() as f64 / 1000.0;

    if result.timed_out {
        let meta = NodeMeta {
            action_name: action_name_of(&spec.node_id),
            success: false,
            start_time,
            end_time,
            duration_seconds,
            exit_code: result.exit_code,
            error_message: Some(format!("timed out after {}s", spec.timeout.as_secs())),
        };
        write_meta(&spec.node_dir, &meta)?;
        return Err(MdlError::Timeout {
            node: spec.node_id.clone(),
            secs: spec.timeout.as_secs(),
        });
    }

    if !result.succeeded() {
        let meta = NodeMeta {
            action_name: action_name_of(&spec.node_id),
            success: false,
            start_time,
            end_time,
            duration_seconds,
            exit_code: result.exit_code,
            error_message: Some(format!("exited with status {}", result.exit_code)),
        };
        write_meta(&spec.node_dir, &meta)?;
        return Err(MdlError::RuntimeFailure {
            node: spec.node_id.clone(),
            message: format!("exited with status {}", result.exit_code),
        });
    }

    let outputs = match load_and_validate_outputs(&spec.node_id, &output_json, spec.version) {
        Ok(outputs) => outputs,
        Err(err) => {
            let meta = NodeMeta {
                action_name: action_name_of(&spec.node_id),
                success: false,
                start_time,
                end_time,
                duration_seconds,
                exit_code: result.exit_code,
                error_message: Some(err.to_string()),
            };
            write_meta(&spec.node_dir, &meta)?;
            return Err(err);
        }
    };

    let meta = NodeMeta {
        action_name: action_name_of(&spec.node_id),
        success: true,
        start_time,
        end_time,
        duration_seconds,
        exit_code: result.exit_code,
        error_message: None,
    };
    write_meta(&spec.node_dir, &meta)?;

    Ok(NodeExecutionOutcome { outputs, meta })
}

fn action_name_of(node_id: &str) -> String {
    node_id.split('@').next().unwrap_or(node_id).to_string()
}

fn interpreter_for(language: mdl_core::Language) -> &'static str {
    match language {
        mdl_core::Language::Bash => "bash",
        mdl_core::Language::Python => "python3",
    }
}

fn write_meta(node_dir: &Path, meta: &NodeMeta) -> Result<(), MdlError> {
    meta.save(&node_dir.join(META_FILE_NAME))
        .map_err(|e| MdlError::RunDirCreate {
            path: node_dir.join(META_FILE_NAME).display().to_string(),
            source: e.to_string(),
        })
}

/// Load `output.json`, require it to exist, and coerce each declared return
/// to its type; `file`/`directory` returns must reference existing paths.
pub(crate) fn load_and_validate_outputs(
    node_id: &str,
    output_json: &Path,
    version: &ActionVersion,
) -> Result<ActionOutputs, MdlError> {
    if !output_json.exists() {
        return Err(MdlError::MissingOutputFile {
            node: node_id.to_string(),
        });
    }
    let text = std::fs::read_to_string(output_json).map_err(|e| MdlError::RuntimeFailure {
        node: node_id.to_string(),
        message: format!("failed to read output.json: {e}"),
    })?;
    let raw: BTreeMap<String, RawOutput> =
        serde_json::from_str(&text).map_err(|e| MdlError::RuntimeFailure {
            node: node_id.to_string(),
            message: format!("failed to parse output.json: {e}"),
        })?;

    let mut outputs = ActionOutputs::new();
    for (name, raw_value) in raw {
        let expected = version.return_type(&name);
        if let Some(expected) = expected {
            if raw_value.ty != expected.as_str() {
                return Err(MdlError::OutputTypeMismatch {
                    node: node_id.to_string(),
                    ret: name,
                    expected,
                    actual: raw_value.ty,
                });
            }
            let typed = coerce(expected, &raw_value.value);
            if expected.is_path_type() {
                let path_str = match &typed {
                    TypedValue::String(s) => s.clone(),
                    _ => String::new(),
                };
                if !Path::new(&path_str).exists() {
                    return Err(MdlError::MissingOutputPath {
                        node: node_id.to_string(),
                        ret: name,
                        ty: expected,
                        path: path_str,
                    });
                }
            }
            outputs.insert(name, typed);
        } else {
            outputs.insert(name, coerce_untyped(&raw_value));
        }
    }

    Ok(outputs)
}

#[derive(serde::Deserialize)]
struct RawOutput {
    #[serde(rename = "type")]
    ty: String,
    value: serde_json::Value,
}

fn coerce(ty: ValueType, value: &serde_json::Value) -> TypedValue {
    match ty {
        ValueType::Int => TypedValue::Int(value.as_i64().unwrap_or_default()),
        ValueType::Bool => TypedValue::Bool(value.as_bool().unwrap_or_default()),
        ValueType::String | ValueType::File | ValueType::Directory => {
            TypedValue::String(value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
        }
    }
}

fn coerce_untyped(raw: &RawOutput) -> TypedValue {
    match raw.ty.as_str() {
        "int" => TypedValue::Int(raw.value.as_i64().unwrap_or_default()),
        "bool" => TypedValue::Bool(raw.value.as_bool().unwrap_or_default()),
        _ => TypedValue::String(
            raw.value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| raw.value.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_core::{Language, ReturnDeclaration};

    fn version_with_returns(returns: Vec<ReturnDeclaration>) -> ActionVersion {
        ActionVersion {
            script: String::new(),
            language: Language::Bash,
            conditions: vec![],
            expansions: vec![],
            returns,
            strong_deps: vec![],
            weak_deps: vec![],
            soft_deps: vec![],
            env_deps: vec![],
            args: vec![],
            flags: vec![],
        }
    }

    #[test]
    fn missing_output_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let version = version_with_returns(vec![]);
        let err = load_and_validate_outputs("build", &dir.path().join("output.json"), &version)
            .unwrap_err();
        assert!(matches!(err, MdlError::MissingOutputFile { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        std::fs::write(&path, r#"{"count":{"type":"string","value":"oops"}}"#).unwrap();
        let version = version_with_returns(vec![ReturnDeclaration {
            name: "count".into(),
            ty: ValueType::Int,
            expr: String::new(),
        }]);
        let err = load_and_validate_outputs("build", &path, &version).unwrap_err();
        assert!(matches!(err, MdlError::OutputTypeMismatch { .. }));
    }

    #[test]
    fn file_return_requires_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        std::fs::write(
            &path,
            r#"{"f":{"type":"file","value":"/no/such/path/here"}}"#,
        )
        .unwrap();
        let version = version_with_returns(vec![ReturnDeclaration {
            name: "f".into(),
            ty: ValueType::File,
            expr: String::new(),
        }]);
        let err = load_and_validate_outputs("build", &path, &version).unwrap_err();
        assert!(matches!(err, MdlError::MissingOutputPath { .. }));
    }

    #[test]
    fn valid_outputs_coerce_by_declared_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        std::fs::write(
            &path,
            r#"{"count":{"type":"int","value":5},"ok":{"type":"bool","value":true}}"#,
        )
        .unwrap();
        let version = version_with_returns(vec![
            ReturnDeclaration {
                name: "count".into(),
                ty: ValueType::Int,
                expr: String::new(),
            },
            ReturnDeclaration {
                name: "ok".into(),
                ty: ValueType::Bool,
                expr: String::new(),
            },
        ]);
        let outputs = load_and_validate_outputs("build", &path, &version).unwrap();
        assert_eq!(outputs.get("count"), Some(&TypedValue::Int(5)));
        assert_eq!(outputs.get("ok"), Some(&TypedValue::Bool(true)));
    }
}
