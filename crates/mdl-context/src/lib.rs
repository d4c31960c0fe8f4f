//! Context algebra and expansion evaluator for Mudyla.

pub mod algebra;
pub mod expand;
pub mod select;

pub use algebra::{RawBinding, default_context, expand_wildcards, layer_cli_context, reduce_to_footprint};
pub use expand::{BindingEnvironment, SystemInfo, classify_token, extract_expansions, render_script};
pub use select::select_version;
