//! Configuration and CLI-layering surface (§10.3): definition-file
//! discovery, the environment contract, global user defaults, and the
//! global-vs-per-invocation axis/arg/flag merge that feeds `mdl-context`.

pub mod cli_bindings;
pub mod defs;
pub mod environment;
pub mod global;

pub use cli_bindings::{
    GoalInvocation, ParsedInvocation, expand_goal_contexts, merge_bindings, merge_values,
    parse_segments,
};
pub use defs::{DEFAULT_DEFS_GLOB, discover_defs};
pub use environment::{available_env, declared_names, resolve_env_values};
pub use global::{GlobalConfig, GlobalDefaults};
