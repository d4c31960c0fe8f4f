//! CI logger: narrates the same transitions as [`crate::simple::SimpleLogger`]
//! with color disabled by default. The `::group::<node-id>` / `::endgroup::`
//! markers themselves are emitted around each node's child-process output by
//! `mdl_process`'s `ConsoleEcho::GithubActionsGroup` (selected alongside this
//! logger for `--github-actions`); this backend only narrates dispatch and
//! completion between those groups.

use mdl_exec::RunObserver;
use mdl_graph::NodeKey;

use crate::simple::SimpleLogger;

pub struct CiGroupLogger {
    inner: SimpleLogger,
}

impl CiGroupLogger {
    pub fn new() -> Self {
        Self {
            inner: SimpleLogger::new(false),
        }
    }
}

impl Default for CiGroupLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for CiGroupLogger {
    fn node_dispatched(&self, node: &NodeKey) {
        self.inner.node_dispatched(node);
    }

    fn node_restored(&self, node: &NodeKey) {
        self.inner.node_restored(node);
    }

    fn node_succeeded(&self, node: &NodeKey, duration_seconds: f64) {
        self.inner.node_succeeded(node, duration_seconds);
    }

    fn node_failed(&self, node: &NodeKey, message: &str) {
        self.inner.node_failed(node, message);
    }

    fn retainer_promoted(&self, retainer: &NodeKey, target: &NodeKey) {
        self.inner.retainer_promoted(retainer, target);
    }

    fn run_aborting(&self) {
        self.inner.run_aborting();
    }
}
