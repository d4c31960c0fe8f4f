//! Error taxonomy for the planner-executor core.
//!
//! Covers document errors, aggregated validation batches, planning errors,
//! per-node runtime errors, and infrastructure errors. No exceptions cross
//! worker boundaries — every failure path returns a tagged [`MdlError`].

use crate::types::ValueType;

/// A single aggregated validation finding (see [`MdlError::Validation`]).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Missing argument '{arg}' for action '{action}': no definition, no default, no CLI binding")]
    MissingArgument { action: String, arg: String },

    #[error("Missing flag definition '{flag}' referenced by action '{action}'")]
    MissingFlag { action: String, flag: String },

    #[error("Unknown axis '{name}' referenced in condition or CLI binding")]
    UnknownAxis { name: String },

    #[error("Value '{value}' is not in the allowed set for axis '{axis}'")]
    InvalidAxisValue { axis: String, value: String },

    #[error("Missing required axis '{axis}' for action '{action}': no binding and no default")]
    MissingRequiredAxis { action: String, axis: String },

    #[error("Missing environment variable '{var}': no value from process or declared environment")]
    MissingEnv { var: String },

    #[error("Action '{action}' has no return named '{ret}' in the selected version")]
    MissingOutput { action: String, ret: String },

    #[error("No version of action '{action}' matches context '{context}'")]
    NoMatchingVersion { action: String, context: String },

    #[error("Ambiguous version for action '{action}' in context '{context}': {count} versions tie on condition count")]
    AmbiguousVersion {
        action: String,
        context: String,
        count: usize,
    },

    #[error("Retainer '{retainer}' declares its own weak/soft dependencies, which is rejected at validation")]
    RetainerHasWeakOrSoftDeps { retainer: String },
}

/// The top-level error type for the planner-executor core.
#[derive(thiserror::Error, Debug)]
pub enum MdlError {
    #[error("Duplicate action name '{0}'")]
    DuplicateAction(String),

    #[error("Axis '{0}' declares more than one default value")]
    DuplicateAxisDefault(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("No matches for {axis}:{pattern}")]
    EmptyWildcard { axis: String, pattern: String },

    #[error("Validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("Node '{node}' failed: {message}")]
    RuntimeFailure { node: String, message: String },

    #[error("Node '{node}' did not produce output.json")]
    MissingOutputFile { node: String },

    #[error("Node '{node}' return '{ret}' has type {actual}, expected {expected}")]
    OutputTypeMismatch {
        node: String,
        ret: String,
        expected: ValueType,
        actual: String,
    },

    #[error("Node '{node}' return '{ret}' ({ty}) references a path that does not exist: {path}")]
    MissingOutputPath {
        node: String,
        ret: String,
        ty: ValueType,
        path: String,
    },

    #[error("Node '{node}' timed out after {secs}s")]
    Timeout { node: String, secs: u64 },

    #[error("Failed to create run directory '{path}': {source}")]
    RunDirCreate { path: String, source: String },

    #[error("Failed to spawn child process for node '{node}': {source}")]
    SpawnFailed { node: String, source: String },
}

impl MdlError {
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        Self::Validation(issues)
    }
}
