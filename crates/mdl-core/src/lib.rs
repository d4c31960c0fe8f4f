//! Domain model and shared error type for Mudyla's planner-executor core.

pub mod document;
pub mod error;
pub mod types;

pub use document::{Document, EnvironmentBlock, load_normalized};
pub use error::{MdlError, ValidationIssue};
pub use types::{
    ActionDefinition, ActionOutputs, ActionVersion, ArgumentDefinition, AxisDefinition, Condition,
    Context, DependencyKind, Expansion, FlagDefinition, Invocation, Language, ReturnDeclaration,
    SoftDependency, TypedValue, ValueType,
};
