//! Domain model: actions, versions, conditions, axes, expansions, returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value type for arguments and return declarations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    String,
    Bool,
    File,
    Directory,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::String => "string",
            Self::Bool => "bool",
            Self::File => "file",
            Self::Directory => "directory",
        }
    }

    /// Whether this type requires an existence check on the filesystem.
    pub fn is_path_type(&self) -> bool {
        matches!(self, Self::File | Self::Directory)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Script language tag for an action version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Bash,
    Python,
}

/// A condition gating an [`ActionVersion`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Condition {
    Axis { name: String, value: String },
    Platform { value: String },
}

impl Condition {
    /// The axis name this condition references, if it is an axis condition.
    pub fn axis_name(&self) -> Option<&str> {
        match self {
            Self::Axis { name, .. } => Some(name),
            Self::Platform { .. } => None,
        }
    }

    pub fn satisfied_by(&self, context: &Context, host_platform: &str) -> bool {
        match self {
            Self::Axis { name, value } => context.get(name) == Some(value.as_str()),
            Self::Platform { value } => value == host_platform,
        }
    }
}

/// An argument declaration on an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub default: Option<String>,
}

impl ArgumentDefinition {
    /// An argument is mandatory iff it declares no default.
    pub fn is_mandatory(&self) -> bool {
        self.default.is_none()
    }
}

/// A boolean flag declaration on an action; defaults to `false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub name: String,
    #[serde(default)]
    pub default: bool,
}

/// An axis declaration: an ordered set of allowed values with at most one default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisDefinition {
    pub name: String,
    pub values: Vec<String>,
    pub default: Option<String>,
}

impl AxisDefinition {
    pub fn allows(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Which dependency kind a `dep`/`weak`/`soft` declaration contributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Strong,
    Weak,
}

/// A soft dependency: `target`, gated on `retainer`'s retain signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDependency {
    pub target: String,
    pub retainer: String,
}

/// A tagged `${…}` reference extracted from a script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expansion {
    System { name: String },
    Env { name: String },
    Args { name: String },
    Flags { name: String },
    ActionStrong { action: String, ret: String },
    ActionWeak { action: String, ret: String },
    /// `retained.weak.X` / `retained.soft.X` — resolves to "1"/"0" at dispatch.
    Retained { action: String },
}

/// A declared return value: name, type, and an unevaluated source expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub expr: String,
}

/// A single version of an action: script text, conditions, dependencies, returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionVersion {
    pub script: String,
    pub language: Language,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub expansions: Vec<Expansion>,
    #[serde(default)]
    pub returns: Vec<ReturnDeclaration>,
    #[serde(default)]
    pub strong_deps: Vec<String>,
    #[serde(default)]
    pub weak_deps: Vec<String>,
    #[serde(default)]
    pub soft_deps: Vec<SoftDependency>,
    #[serde(default)]
    pub env_deps: Vec<String>,
    #[serde(default)]
    pub args: Vec<ArgumentDefinition>,
    #[serde(default)]
    pub flags: Vec<FlagDefinition>,
}

impl ActionVersion {
    /// Number of conditions this version declares — used for version selection (maximal match).
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn satisfies(&self, context: &Context, host_platform: &str) -> bool {
        self.conditions
            .iter()
            .all(|c| c.satisfied_by(context, host_platform))
    }

    /// Union of axis names referenced by this version's own conditions.
    pub fn own_axis_footprint(&self) -> std::collections::BTreeSet<String> {
        self.conditions
            .iter()
            .filter_map(Condition::axis_name)
            .map(ToOwned::to_owned)
            .collect()
    }

    pub fn return_type(&self, name: &str) -> Option<ValueType> {
        self.returns.iter().find(|r| r.name == name).map(|r| r.ty)
    }
}

/// A named action: kebab-case identity, zero-or-more versions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_env: Vec<String>,
    pub versions: Vec<ActionVersion>,
}

/// A mapping `axis-name -> axis-value`, with equality/ordering by the mapping itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Context(pub BTreeMap<String, String>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    pub fn insert(&mut self, axis: impl Into<String>, value: impl Into<String>) {
        self.0.insert(axis.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Restrict this context to the given set of axis names.
    pub fn restrict(&self, axes: &std::collections::BTreeSet<String>) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| axes.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Merge `other` on top of `self`; `other` wins on conflicting axes.
    pub fn layered_over(&self, other: &Context) -> Self {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        Self(merged)
    }

    /// Human-readable label: `axis:value+axis:value`, or `global` if empty.
    pub fn label(&self) -> String {
        if self.0.is_empty() {
            return "global".to_string();
        }
        self.0
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Stable, directory-safe identifier: a hash of the sorted (axis, value) pairs.
    pub fn stable_id(&self) -> String {
        use sha2::{Digest, Sha256};
        if self.0.is_empty() {
            return "global".to_string();
        }
        let mut hasher = Sha256::new();
        for (k, v) in &self.0 {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b";");
        }
        let digest = hasher.finalize();
        hex_encode(&digest[..8])
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A goal invocation: action name, explicit axis bindings, per-invocation args/flags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub goal: String,
    pub axis_bindings: BTreeMap<String, String>,
    pub args: BTreeMap<String, String>,
    pub flags: BTreeMap<String, bool>,
}

/// A typed output value, coerced per its declared [`ValueType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TypedValue {
    Int(i64),
    Bool(bool),
    String(String),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Bool(_) => ValueType::Bool,
            Self::String(_) => ValueType::String,
        }
    }

    pub fn as_json_value(&self) -> serde_json::Value {
        match self {
            Self::Int(i) => serde_json::json!(i),
            Self::Bool(b) => serde_json::json!(b),
            Self::String(s) => serde_json::json!(s),
        }
    }
}

/// `return-name -> typed value` for a single completed node.
pub type ActionOutputs = BTreeMap<String, TypedValue>;
