//! Dependency graph construction and validation for Mudyla.

pub mod builder;
pub mod footprint;
pub mod graph;
pub mod key;
pub mod validate;

pub use builder::GraphBuilder;
pub use footprint::compute_action_footprints;
pub use graph::{Graph, GraphNode};
pub use key::NodeKey;
pub use validate::{ValidationInputs, validate};
