//! Dynamic, in-place table: redraws one row per node whenever any node's
//! status changes. The default backend when stdout is a TTY and neither
//! `--simple-log` nor `--github-actions` was requested.
//!
//! Implemented with plain cursor-movement escape codes (move up N lines,
//! clear to end of screen, reprint) rather than a terminal UI crate.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;

use mdl_exec::RunObserver;
use mdl_graph::NodeKey;

use crate::style::Style;

#[derive(Clone, Debug, PartialEq)]
enum RowStatus {
    Pending,
    Running,
    Restored,
    Succeeded(f64),
    Failed(String),
}

struct TableState {
    order: Vec<NodeKey>,
    statuses: BTreeMap<NodeKey, RowStatus>,
    footer: Vec<String>,
    lines_printed: usize,
}

pub struct LiveTableLogger {
    style: Style,
    state: Mutex<TableState>,
}

impl LiveTableLogger {
    pub fn new(color: bool) -> Self {
        Self {
            style: Style::new(color),
            state: Mutex::new(TableState {
                order: Vec::new(),
                statuses: BTreeMap::new(),
                footer: Vec::new(),
                lines_printed: 0,
            }),
        }
    }

    fn set_status(&self, node: &NodeKey, status: RowStatus) {
        let mut state = self.state.lock().expect("live table state poisoned");
        if !state.statuses.contains_key(node) {
            state.order.push(node.clone());
        }
        state.statuses.insert(node.clone(), status);
        self.redraw(&mut state);
    }

    fn redraw(&self, state: &mut TableState) {
        let mut out = std::io::stdout().lock();
        if state.lines_printed > 0 {
            let _ = write!(out, "\x1b[{}A\x1b[J", state.lines_printed);
        }
        let mut printed = 0usize;
        for key in &state.order {
            let status = state.statuses.get(key).unwrap_or(&RowStatus::Pending);
            let _ = writeln!(out, "{}", render_row(key, status, &self.style));
            printed += 1;
        }
        for line in &state.footer {
            let _ = writeln!(out, "{line}");
            printed += 1;
        }
        state.lines_printed = printed;
        let _ = out.flush();
    }
}

fn render_row(key: &NodeKey, status: &RowStatus, style: &Style) -> String {
    let (badge, label) = match status {
        RowStatus::Pending => (style.dim("pending"), key.label()),
        RowStatus::Running => (style.yellow("running"), key.label()),
        RowStatus::Restored => (style.dim("restored"), key.label()),
        RowStatus::Succeeded(secs) => (style.green("ok"), format!("{} ({secs:.2}s)", key.label())),
        RowStatus::Failed(message) => (style.red("failed"), format!("{} — {message}", key.label())),
    };
    format!("  [{badge:>9}] {label}")
}

impl RunObserver for LiveTableLogger {
    fn node_dispatched(&self, node: &NodeKey) {
        self.set_status(node, RowStatus::Running);
    }

    fn node_restored(&self, node: &NodeKey) {
        self.set_status(node, RowStatus::Restored);
    }

    fn node_succeeded(&self, node: &NodeKey, duration_seconds: f64) {
        self.set_status(node, RowStatus::Succeeded(duration_seconds));
    }

    fn node_failed(&self, node: &NodeKey, message: &str) {
        self.set_status(node, RowStatus::Failed(message.to_string()));
    }

    fn retainer_promoted(&self, _retainer: &NodeKey, target: &NodeKey) {
        let mut state = self.state.lock().expect("live table state poisoned");
        if !state.statuses.contains_key(target) {
            state.order.push(target.clone());
            state.statuses.insert(target.clone(), RowStatus::Pending);
            self.redraw(&mut state);
        }
    }

    fn run_aborting(&self) {
        let mut state = self.state.lock().expect("live table state poisoned");
        state.footer.push(self.style.red("aborting: draining in-flight nodes").to_string());
        self.redraw(&mut state);
    }
}
