//! Plain, line-oriented logger: one line per state transition, no cursor
//! movement. Selected by `--simple-log`, and the fallback whenever stdout
//! isn't a TTY (a live table redrawing itself is meaningless piped to a
//! file or a CI log collector).

use mdl_exec::RunObserver;
use mdl_graph::NodeKey;

use crate::style::Style;

pub struct SimpleLogger {
    style: Style,
}

impl SimpleLogger {
    pub fn new(color: bool) -> Self {
        Self {
            style: Style::new(color),
        }
    }
}

impl RunObserver for SimpleLogger {
    fn node_dispatched(&self, node: &NodeKey) {
        println!("{} {}", self.style.dim("[run]"), node.label());
    }

    fn node_restored(&self, node: &NodeKey) {
        println!(
            "{} {} restored from previous run",
            self.style.dim("[restored]"),
            node.label()
        );
    }

    fn node_succeeded(&self, node: &NodeKey, duration_seconds: f64) {
        println!(
            "{} {} ({:.2}s)",
            self.style.green("[ok]"),
            node.label(),
            duration_seconds
        );
    }

    fn node_failed(&self, node: &NodeKey, message: &str) {
        println!("{} {}: {}", self.style.red("[fail]"), node.label(), message);
    }

    fn retainer_promoted(&self, retainer: &NodeKey, target: &NodeKey) {
        println!(
            "{} {} retained {}",
            self.style.yellow("[retain]"),
            retainer.label(),
            target.label()
        );
    }

    fn run_aborting(&self) {
        println!("{}", self.style.red("[abort] draining in-flight nodes"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_core::Context;

    #[test]
    fn logger_does_not_panic_on_every_transition() {
        let logger = SimpleLogger::new(false);
        let key = NodeKey::new("build", Context::new());
        logger.node_dispatched(&key);
        logger.node_succeeded(&key, 1.0);
        logger.node_failed(&key, "boom");
        logger.node_restored(&key);
        logger.retainer_promoted(&key, &key);
        logger.run_aborting();
    }
}
