//! Parallel dispatch: walks a [`Plan`] to completion, running each node's
//! process once its strong/weak/soft blockers clear, bounded by a worker
//! pool, aborting the rest of the dispatch on the first failure.
//!
//! One task — this function's own caller — owns every piece of mutable
//! scheduling state (readiness counters, the output table, the retainer
//! ledger) and only ever mutates it from the single loop below, between
//! `await` points on a completion channel. Each node's execution itself runs
//! as an independent tokio task holding an owned snapshot of whatever
//! ancestor state it needs; results come back over the channel rather than
//! through a shared lock.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mdl_context::SystemInfo;
use mdl_core::{ActionOutputs, ActionVersion, Document, MdlError};
use mdl_graph::{Graph, NodeKey};
use mdl_planner::Plan;
use mdl_process::ConsoleEcho;
use mdl_resource::CommandWrapper;
use mdl_store::{META_FILE_NAME, NodeMeta, OUTPUT_FILE_NAME, RunStore};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::node_exec::{self, NodeExecutionSpec, execute_node};
use crate::observer::RunObserver;
use crate::render::{RenderInputs, render_node_script};
use crate::retainer::{sentinel_present, should_promote};

/// Everything the scheduler needs about the run's inputs that doesn't change
/// node to node.
pub struct SchedulerConfig<'a> {
    pub document: &'a Document,
    pub system: SystemInfo,
    /// Values resolved for `${env.*}` expansions inside scripts.
    pub env_values: BTreeMap<String, String>,
    /// The real parent process environment, used to build each node's child
    /// environment through `wrapper`.
    pub process_env: BTreeMap<String, String>,
    /// Flat, run-wide CLI-provided argument/flag overrides (invariant 2:
    /// unified nodes must see byte-identical bindings regardless of call
    /// site, so there is exactly one namespace for the whole run).
    pub cli_args: BTreeMap<String, String>,
    pub cli_flags: BTreeMap<String, bool>,
    pub wrapper: &'a dyn CommandWrapper,
    pub run_dir: &'a Path,
    pub prior_run_dir: Option<&'a Path>,
    pub max_workers: usize,
    pub node_timeout: Duration,
    pub echo: ConsoleEcho,
    pub observer: &'a dyn RunObserver,
}

/// What the scheduler accomplished: the final output table, which nodes
/// failed, which were restored verbatim from a prior run, and whether the
/// run should be considered successful overall.
#[derive(Debug, Default)]
pub struct SchedulerReport {
    pub outputs_by_action: BTreeMap<String, ActionOutputs>,
    pub executed: BTreeSet<NodeKey>,
    pub restored: BTreeSet<NodeKey>,
    pub failures: Vec<(NodeKey, String)>,
}

impl SchedulerReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

struct CompletionMsg {
    key: NodeKey,
    outcome: Result<(ActionOutputs, f64), String>,
    restored: bool,
}

/// Mutable scheduling state, owned entirely by the dispatch loop.
struct State {
    /// The plan's complete strong-reachability set, fixed at construction —
    /// used to decide weak-edge gating so that it never depends on the
    /// (alphabetical) order `plan.reachable` happens to be iterated in.
    reachable: BTreeSet<NodeKey>,
    executable: BTreeSet<NodeKey>,
    remaining_strong: BTreeMap<NodeKey, usize>,
    remaining_weak: BTreeMap<NodeKey, usize>,
    extra_block: BTreeMap<NodeKey, usize>,
    strong_dependents: BTreeMap<NodeKey, Vec<NodeKey>>,
    weak_dependents: BTreeMap<NodeKey, Vec<NodeKey>>,
    /// retainer key -> (consumer, soft target) edges gated on it.
    retainer_edges: BTreeMap<NodeKey, Vec<(NodeKey, NodeKey)>>,
    /// soft target -> consumers waiting on it to finish once promoted.
    soft_waiters: BTreeMap<NodeKey, Vec<NodeKey>>,
    completed: BTreeMap<NodeKey, bool>,
    retained_by_action: BTreeMap<String, bool>,
    outputs_by_action: BTreeMap<String, ActionOutputs>,
    rank: BTreeMap<NodeKey, usize>,
    next_rank: usize,
    ready: VecDeque<NodeKey>,
    dispatched: BTreeSet<NodeKey>,
    run_dir: PathBuf,
}

impl State {
    fn new(graph: &Graph, plan: &Plan, run_dir: PathBuf) -> Self {
        let mut state = State {
            reachable: plan.reachable.clone(),
            executable: BTreeSet::new(),
            remaining_strong: BTreeMap::new(),
            remaining_weak: BTreeMap::new(),
            extra_block: BTreeMap::new(),
            strong_dependents: BTreeMap::new(),
            weak_dependents: BTreeMap::new(),
            retainer_edges: BTreeMap::new(),
            soft_waiters: BTreeMap::new(),
            completed: BTreeMap::new(),
            retained_by_action: BTreeMap::new(),
            outputs_by_action: BTreeMap::new(),
            rank: BTreeMap::new(),
            next_rank: 0,
            ready: VecDeque::new(),
            dispatched: BTreeSet::new(),
            run_dir,
        };
        for (i, key) in plan.order.iter().enumerate() {
            state.rank.insert(key.clone(), i);
        }
        state.next_rank = plan.order.len();
        for key in &plan.reachable {
            state.activate(key, graph);
        }
        state
    }

    /// Bring `key` (and, recursively, every strong ancestor it needs) into
    /// the executable set. Idempotent.
    fn activate(&mut self, key: &NodeKey, graph: &Graph) {
        if self.executable.contains(key) {
            return;
        }
        self.executable.insert(key.clone());
        self.retained_by_action.insert(key.action.clone(), true);
        self.rank.entry(key.clone()).or_insert_with(|| {
            let r = self.next_rank;
            self.next_rank += 1;
            r
        });

        let Some(node) = graph.node(key) else {
            self.remaining_strong.insert(key.clone(), 0);
            self.remaining_weak.insert(key.clone(), 0);
            self.extra_block.insert(key.clone(), 0);
            return;
        };

        for dep in &node.strong_deps {
            self.activate(dep, graph);
            self.strong_dependents
                .entry(dep.clone())
                .or_default()
                .push(key.clone());
        }
        for dep in &node.weak_deps {
            if self.reachable.contains(dep) {
                self.activate(dep, graph);
                self.weak_dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(key.clone());
            }
        }

        let strong_count = node
            .strong_deps
            .iter()
            .filter(|d| !self.completed.contains_key(*d))
            .count();
        let weak_count = node
            .weak_deps
            .iter()
            .filter(|d| self.reachable.contains(d) && !self.completed.contains_key(d))
            .count();
        self.remaining_strong.insert(key.clone(), strong_count);
        self.remaining_weak.insert(key.clone(), weak_count);
        self.extra_block.insert(key.clone(), 0);

        for (target, retainer) in &node.soft_deps {
            self.retainer_edges
                .entry(retainer.clone())
                .or_default()
                .push((key.clone(), target.clone()));
            if let Some(&retainer_succeeded) = self.completed.get(retainer) {
                let promote = should_promote(
                    retainer_succeeded,
                    sentinel_present(&node_dir_of(retainer, &self.run_dir)),
                );
                if promote {
                    self.retained_by_action.insert(target.action.clone(), true);
                    self.activate(target, graph);
                    if !self.completed.contains_key(target) {
                        *self.extra_block.entry(key.clone()).or_insert(0) += 1;
                        self.soft_waiters
                            .entry(target.clone())
                            .or_default()
                            .push(key.clone());
                    }
                }
            }
        }

        self.try_enqueue(key);
    }

    fn try_enqueue(&mut self, key: &NodeKey) {
        if self.completed.contains_key(key) || self.dispatched.contains(key) {
            return;
        }
        let strong = self.remaining_strong.get(key).copied().unwrap_or(0);
        let weak = self.remaining_weak.get(key).copied().unwrap_or(0);
        let extra = self.extra_block.get(key).copied().unwrap_or(0);
        if strong == 0 && weak == 0 && extra == 0 && !self.ready.contains(key) {
            self.ready.push_back(key.clone());
        }
    }

    /// Pop the lowest-rank, then lexicographically-least, ready node.
    fn pop_best_ready(&mut self) -> Option<NodeKey> {
        if self.ready.is_empty() {
            return None;
        }
        let mut best_idx = 0;
        for (i, key) in self.ready.iter().enumerate().skip(1) {
            let best = &self.ready[best_idx];
            let rank_key = self.rank.get(key).copied().unwrap_or(usize::MAX);
            let rank_best = self.rank.get(best).copied().unwrap_or(usize::MAX);
            if (rank_key, key.id()) < (rank_best, best.id()) {
                best_idx = i;
            }
        }
        self.ready.remove(best_idx)
    }

    /// Record `key` as finished and cascade readiness/promotion updates to
    /// its dependents. Returns the set of nodes newly activated by soft
    /// promotion, for the caller to dispatch-check on the next pass.
    fn on_completion(&mut self, graph: &Graph, key: &NodeKey, success: bool) {
        self.completed.insert(key.clone(), success);
        self.dispatched.remove(key);

        if !success {
            return;
        }

        if let Some(edges) = self.retainer_edges.get(key).cloned() {
            for (consumer, target) in edges {
                let promote = should_promote(
                    true,
                    sentinel_present(&node_dir_of(key, &self.run_dir)),
                );
                if promote {
                    self.retained_by_action.insert(target.action.clone(), true);
                    self.activate(&target, graph);
                    if !self.completed.contains_key(&target) {
                        *self.extra_block.entry(consumer.clone()).or_insert(0) += 1;
                        self.soft_waiters.entry(target.clone()).or_default().push(consumer);
                    }
                }
            }
        }

        if let Some(consumers) = self.strong_dependents.get(key).cloned() {
            for consumer in consumers {
                if let Some(count) = self.remaining_strong.get_mut(&consumer) {
                    *count = count.saturating_sub(1);
                }
                self.try_enqueue(&consumer);
            }
        }
        if let Some(consumers) = self.weak_dependents.get(key).cloned() {
            for consumer in consumers {
                if let Some(count) = self.remaining_weak.get_mut(&consumer) {
                    *count = count.saturating_sub(1);
                }
                self.try_enqueue(&consumer);
            }
        }
        if let Some(consumers) = self.soft_waiters.remove(key) {
            for consumer in consumers {
                if let Some(count) = self.extra_block.get_mut(&consumer) {
                    *count = count.saturating_sub(1);
                }
                self.try_enqueue(&consumer);
            }
        }
    }
}

fn node_dir_of(key: &NodeKey, run_dir: &Path) -> PathBuf {
    RunStore::node_dir(run_dir, &key.id())
}

fn resolve_args(version: &ActionVersion, cli_args: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    for def in &version.args {
        if let Some(value) = cli_args.get(&def.name) {
            resolved.insert(def.name.clone(), value.clone());
        } else if let Some(default) = &def.default {
            resolved.insert(def.name.clone(), default.clone());
        }
    }
    resolved
}

fn resolve_flags(version: &ActionVersion, cli_flags: &BTreeMap<String, bool>) -> BTreeMap<String, bool> {
    version
        .flags
        .iter()
        .map(|def| {
            let value = cli_flags.get(&def.name).copied().unwrap_or(def.default);
            (def.name.clone(), value)
        })
        .collect()
}

fn required_env_for(document: &Document, version: &ActionVersion, action: &str) -> Vec<String> {
    let mut required = document
        .find_action(action)
        .map(|a| a.required_env.clone())
        .unwrap_or_default();
    required.extend(version.env_deps.clone());
    required
}

/// Run `plan` against `graph` to completion (or first failure).
pub async fn run_plan(graph: &Graph, plan: &Plan, config: &SchedulerConfig<'_>) -> SchedulerReport {
    let run_dir = config.run_dir.to_path_buf();
    let mut state = State::new(graph, plan, run_dir.clone());
    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<CompletionMsg>();

    let mut report = SchedulerReport::default();
    let mut in_flight = 0usize;
    let mut aborting = false;

    loop {
        while !aborting {
            let Some(key) = state.pop_best_ready() else {
                break;
            };
            let Some(permit) = semaphore.clone().try_acquire_owned().ok() else {
                state.ready.push_front(key);
                break;
            };
            state.dispatched.insert(key.clone());
            in_flight += 1;
            config.observer.node_dispatched(&key);

            let node_dir = RunStore::node_dir(&run_dir, &key.id());

            if let Some(prior) = config.prior_run_dir {
                match restore_if_possible(prior, &run_dir, &key, graph) {
                    Ok(Some((outputs, duration))) => {
                        config.observer.node_restored(&key);
                        report.restored.insert(key.clone());
                        in_flight -= 1;
                        let _ = tx.send(CompletionMsg {
                            key,
                            outcome: Ok((outputs, duration)),
                            restored: true,
                        });
                        drop(permit);
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(node = %key, error = %e, "failed to restore node from prior run");
                    }
                }
            }

            let Some(node) = graph.node(&key) else {
                in_flight -= 1;
                let _ = tx.send(CompletionMsg {
                    key,
                    outcome: Err("node missing from graph".to_string()),
                    restored: false,
                });
                drop(permit);
                continue;
            };

            let version = node.version.clone();
            let args = resolve_args(&version, &config.cli_args);
            let flags = resolve_flags(&version, &config.cli_flags);
            let required_env = required_env_for(config.document, &version, &key.action);
            let child_env = config
                .wrapper
                .child_env(&config.document.environment, &required_env, &config.process_env);
            let outputs_snapshot = state.outputs_by_action.clone();
            let retained_snapshot = state.retained_by_action.clone();
            let system = config.system.clone();
            let env_values = config.env_values.clone();
            let timeout = config.node_timeout;
            let echo = config.echo;
            let node_id = key.id();
            let tx = tx.clone();
            let key_for_task = key.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let output_json = node_dir.join(OUTPUT_FILE_NAME);
                let retain_flag = node_dir.join(mdl_store::RETAIN_SENTINEL_FILE_NAME);
                let context_json_path = node_dir.join("context.json");

                let inputs = RenderInputs {
                    system: &system,
                    env: &env_values,
                    args: &args,
                    flags: &flags,
                    strong_outputs: &outputs_snapshot,
                    weak_outputs: &outputs_snapshot,
                    retained: &retained_snapshot,
                };
                let rendered = render_node_script(
                    &version.script,
                    version.language,
                    &inputs,
                    &output_json,
                    &retain_flag,
                    &context_json_path,
                );

                let spec = NodeExecutionSpec {
                    node_id: node_id.clone(),
                    node_dir,
                    version: &version,
                    rendered,
                    child_env,
                    timeout,
                    echo,
                };

                let outcome = execute_node(spec)
                    .await
                    .map(|o| (o.outputs, o.meta.duration_seconds))
                    .map_err(|e| e.to_string());
                let _ = tx.send(CompletionMsg {
                    key: key_for_task,
                    outcome,
                    restored: false,
                });
            });
        }

        if in_flight == 0 {
            break;
        }

        let Some(msg) = rx.recv().await else {
            break;
        };
        in_flight -= 1;

        match msg.outcome {
            Ok((outputs, duration)) => {
                state.outputs_by_action.insert(msg.key.action.clone(), outputs.clone());
                report.outputs_by_action.insert(msg.key.action.clone(), outputs);
                report.executed.insert(msg.key.clone());
                config.observer.node_succeeded(&msg.key, duration);
                debug!(node = %msg.key, restored = msg.restored, duration_seconds = duration, "node finished");
                state.on_completion(graph, &msg.key, true);
            }
            Err(message) => {
                config.observer.node_failed(&msg.key, &message);
                report.failures.push((msg.key.clone(), message));
                state.on_completion(graph, &msg.key, false);
                if !aborting {
                    aborting = true;
                    config.observer.run_aborting();
                    info!(node = %msg.key, "aborting run after first failure, draining in-flight nodes");
                }
            }
        }

        if aborting && in_flight == 0 {
            break;
        }
    }

    report
}

/// Attempt to restore `key` verbatim from `prior_run`; `Ok(None)` means no
/// usable prior run exists for this node (fall through to execution).
fn restore_if_possible(
    prior_run: &Path,
    current_run: &Path,
    key: &NodeKey,
    graph: &Graph,
) -> Result<Option<(ActionOutputs, f64)>, MdlError> {
    let node_id = key.id();
    let restored = RunStore::restore_node(prior_run, current_run, &node_id)
        .map_err(|e| MdlError::RunDirCreate {
            path: current_run.display().to_string(),
            source: e.to_string(),
        })?;
    if !restored {
        return Ok(None);
    }
    let node_dir = RunStore::node_dir(current_run, &node_id);
    let meta = NodeMeta::load(&node_dir.join(META_FILE_NAME)).map_err(|e| MdlError::RunDirCreate {
        path: node_dir.join(META_FILE_NAME).display().to_string(),
        source: e.to_string(),
    })?;
    let version = graph
        .node(key)
        .map(|n| &n.version)
        .ok_or_else(|| MdlError::RuntimeFailure {
            node: node_id.clone(),
            message: "node missing from graph during restore".to_string(),
        })?;
    let outputs = node_exec::load_and_validate_outputs(&node_id, &node_dir.join(OUTPUT_FILE_NAME), version)?;
    Ok(Some((outputs, meta.duration_seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdl_context::SystemInfo;
    use mdl_core::{ActionDefinition, Context, EnvironmentBlock, Language};
    use mdl_graph::GraphNode;
    use mdl_resource::PassthroughWrapper;
    use std::collections::BTreeSet as Set;

    fn version(script: &str) -> ActionVersion {
        ActionVersion {
            script: script.to_string(),
            language: Language::Bash,
            conditions: vec![],
            expansions: vec![],
            returns: vec![],
            strong_deps: vec![],
            weak_deps: vec![],
            soft_deps: vec![],
            env_deps: vec![],
            args: vec![],
            flags: vec![],
        }
    }

    fn document() -> Document {
        Document {
            actions: vec![
                ActionDefinition {
                    name: "dep".into(),
                    description: String::new(),
                    required_env: vec![],
                    versions: vec![version("echo dep > out.txt")],
                },
                ActionDefinition {
                    name: "goal".into(),
                    description: String::new(),
                    required_env: vec![],
                    versions: vec![version("echo goal > out.txt")],
                },
            ],
            axes: vec![],
            environment: EnvironmentBlock::default(),
        }
    }

    fn two_node_graph() -> Graph {
        let dep_key = NodeKey::new("dep", Context::new());
        let goal_key = NodeKey::new("goal", Context::new());
        let mut nodes = BTreeMap::new();
        nodes.insert(
            dep_key.clone(),
            GraphNode {
                key: dep_key.clone(),
                version: version("ret count:int=1"),
                strong_deps: Set::new(),
                weak_deps: Set::new(),
                soft_deps: BTreeMap::new(),
            },
        );
        nodes.insert(
            goal_key.clone(),
            GraphNode {
                key: goal_key.clone(),
                version: version("echo \"${action.strong.dep.count}\" > /dev/null"),
                strong_deps: Set::from([dep_key.clone()]),
                weak_deps: Set::new(),
                soft_deps: BTreeMap::new(),
            },
        );
        Graph {
            nodes,
            goals: vec![goal_key],
        }
    }

    #[tokio::test]
    async fn linear_chain_runs_dependency_before_goal() {
        let graph = two_node_graph();
        let plan = mdl_planner::build_plan(&graph, &[]);
        let doc = document();
        let run_root = tempfile::tempdir().unwrap();
        let wrapper = PassthroughWrapper;
        let observer = crate::observer::NullObserver;
        let config = SchedulerConfig {
            document: &doc,
            system: SystemInfo {
                os: "linux".into(),
                arch: "x86_64".into(),
            },
            env_values: BTreeMap::new(),
            process_env: std::env::vars().collect(),
            cli_args: BTreeMap::new(),
            cli_flags: BTreeMap::new(),
            wrapper: &wrapper,
            run_dir: run_root.path(),
            prior_run_dir: None,
            max_workers: 2,
            node_timeout: Duration::from_secs(5),
            echo: ConsoleEcho::Silent,
            observer: &observer,
        };

        let report = run_plan(&graph, &plan, &config).await;
        assert!(report.succeeded(), "failures: {:?}", report.failures);
        assert_eq!(report.executed.len(), 2);
    }
}
