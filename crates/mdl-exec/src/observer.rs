//! The narrow interface the scheduler reports state transitions through.
//!
//! Kept separate from any particular presentation so the logger backends
//! (simple / live-table / CI-group) can each implement it without this crate
//! depending on them.

use mdl_graph::NodeKey;

/// Observes scheduler state transitions as a run progresses.
pub trait RunObserver: Send + Sync {
    fn node_dispatched(&self, _node: &NodeKey) {}
    fn node_restored(&self, _node: &NodeKey) {}
    fn node_succeeded(&self, _node: &NodeKey, _duration_seconds: f64) {}
    fn node_failed(&self, _node: &NodeKey, _message: &str) {}
    fn retainer_promoted(&self, _retainer: &NodeKey, _target: &NodeKey) {}
    fn run_aborting(&self) {}
}

/// An observer that reports nothing — the default for contexts (unit
/// tests, library callers) that don't need run progress narrated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RunObserver for NullObserver {}
