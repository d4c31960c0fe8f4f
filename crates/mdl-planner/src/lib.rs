//! Execution plan construction over a validated dependency graph.

pub mod display;
pub mod plan;

pub use display::render_plan;
pub use plan::{Plan, SoftWatch, build_plan, strong_reachable};
