//! Wires the parsed CLI invocation through document loading, context
//! layering, graph building, validation, planning, and execution — the
//! per-invocation `Engine` described in the design notes, inlined as one
//! function rather than a long-lived value since nothing here outlives a
//! single run.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use mdl_config::{GlobalDefaults, ParsedInvocation};
use mdl_context::SystemInfo;
use mdl_core::{Context, Document};
use mdl_exec::SchedulerConfig;
use mdl_graph::{GraphBuilder, NodeKey, ValidationInputs};
use mdl_log::LoggerOptions;
use mdl_process::ConsoleEcho;
use mdl_store::{META_FILE_NAME, NodeMeta, RunStore};

use crate::cli::Cli;
use crate::introspect::{render_actions, render_autocomplete};

/// Per-node idle timeout: no output on either stream for this long kills the
/// process group. Not exposed as a flag in the grammar this crate implements.
const NODE_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// One goal's fully-merged invocation: global bindings layered under its
/// own local ones, expanded to the concrete (non-wildcard) contexts it runs
/// under.
struct ExpandedGoal {
    action: String,
    contexts: Vec<Context>,
    args: BTreeMap<String, String>,
    flags: BTreeMap<String, bool>,
}

fn expand_goals(document: &Document, parsed: &ParsedInvocation) -> Result<Vec<ExpandedGoal>> {
    parsed
        .goals
        .iter()
        .map(|goal| {
            let axis_bindings = mdl_config::merge_bindings(&parsed.global_axis, &goal.axis_bindings);
            let args = mdl_config::merge_values(&parsed.global_args, &goal.args);
            let flags = mdl_config::merge_values(&parsed.global_flags, &goal.flags);
            let contexts = mdl_config::expand_goal_contexts(&axis_bindings, &document.axes)
                .with_context(|| format!("expanding axis bindings for goal '{}'", goal.goal))?;
            Ok(ExpandedGoal {
                action: goal.goal.clone(),
                contexts,
                args,
                flags,
            })
        })
        .collect()
}

fn worker_count(defaults: &GlobalDefaults, seq: bool) -> usize {
    if seq {
        return 1;
    }
    let cpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    (defaults.worker_count as usize).clamp(1, cpu.min(32))
}

/// Reconstruct the order nodes finished in during a prior run, oldest first,
/// from each node directory's `meta.json` — the input `build_plan` uses to
/// break ties the same way twice in a row (invariant 6: `--continue` with no
/// other changes reproduces the same run).
fn derive_prior_order(prior_run_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(prior_run_dir) else {
        return Vec::new();
    };
    let mut timed: Vec<(String, chrono::DateTime<chrono::Utc>)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let node_id = e.file_name().to_string_lossy().into_owned();
            let meta = NodeMeta::load(&e.path().join(META_FILE_NAME)).ok()?;
            Some((node_id, meta.start_time))
        })
        .collect();
    timed.sort_by_key(|(_, start)| *start);
    timed.into_iter().map(|(id, _)| id).collect()
}

/// Run the parsed invocation to completion. Returns the process exit code
/// per §6: 0 success, 1 user/validation error, 2 action failure, 130 cancelled.
pub async fn run(cli: Cli) -> Result<i32> {
    let project_root = std::env::current_dir().context("failed to read current directory")?;
    let global_config = mdl_config::GlobalConfig::load()?;

    let defs = mdl_config::discover_defs(&project_root, &cli.defs)
        .context("failed to discover definition files")?;
    tracing::debug!(count = defs.len(), pattern = %cli.defs, "discovered definition files");

    let document = mdl_core::load_normalized(&cli.document)
        .with_context(|| format!("failed to load document '{}'", cli.document.display()))?;

    if let Some(source) = &cli.autocomplete {
        let text = render_autocomplete(&document, source, cli.autocomplete_axis.as_deref())?;
        println!("{text}");
        return Ok(0);
    }

    if cli.list_actions {
        print!("{}", render_actions(&document));
        return Ok(0);
    }

    let parsed = mdl_config::parse_segments(&cli.goal_tokens)
        .context("failed to parse CLI axis/arg/flag bindings")?;
    if parsed.goals.is_empty() {
        anyhow::bail!("no goal specified; provide at least one :goal segment");
    }

    let host_platform = std::env::consts::OS.to_string();
    let expanded_goals = expand_goals(&document, &parsed)?;

    let mut builder = GraphBuilder::new(&document, host_platform);
    let mut goal_keys: Vec<NodeKey> = Vec::new();
    let mut flat_args: BTreeMap<String, String> = parsed.global_args.clone();
    let mut flat_flags: BTreeMap<String, bool> = parsed.global_flags.clone();
    for goal in &expanded_goals {
        flat_args.extend(goal.args.clone());
        flat_flags.extend(goal.flags.clone());
        for context in &goal.contexts {
            if let Some(key) = builder.add_goal(&goal.action, context) {
                goal_keys.push(key);
            }
        }
    }
    let (graph, mut issues) = builder.finish(goal_keys);

    let process_env: BTreeMap<String, String> = std::env::vars().collect();
    let available_env = mdl_config::available_env(&document, &process_env);
    let validation_inputs = ValidationInputs {
        axes: &document.axes,
        args: &flat_args,
        available_env: &available_env,
    };
    issues.extend(mdl_graph::validate(&graph, &validation_inputs));

    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("error: {issue}");
        }
        return Ok(1);
    }

    let run_store = RunStore::new(&project_root);
    let prior_run_dir = if cli.continue_run { run_store.latest_run()? } else { None };
    let prior_order = prior_run_dir.as_deref().map(derive_prior_order).unwrap_or_default();
    let plan = mdl_planner::build_plan(&graph, &prior_order);

    if cli.dry_run {
        print!("{}", mdl_planner::render_plan(&graph, &plan));
        return Ok(0);
    }

    let run_dir = run_store.create_run()?;
    let wrapper = mdl_resource::select_wrapper(cli.without_nix);
    let echo = if cli.github_actions {
        ConsoleEcho::GithubActionsGroup
    } else if cli.verbose {
        ConsoleEcho::Plain
    } else {
        ConsoleEcho::Silent
    };
    let logger_options = LoggerOptions {
        simple_log: cli.simple_log,
        github_actions: cli.github_actions,
        no_color: cli.no_color,
        stdout_is_tty: std::io::stdout().is_terminal(),
    };
    let observer = mdl_log::select_logger(logger_options);
    let env_values = mdl_config::resolve_env_values(&document, &process_env);

    let config = SchedulerConfig {
        document: &document,
        system: SystemInfo::detect(),
        env_values,
        process_env,
        cli_args: flat_args,
        cli_flags: flat_flags,
        wrapper: wrapper.as_ref(),
        run_dir: &run_dir,
        prior_run_dir: prior_run_dir.as_deref(),
        max_workers: worker_count(&global_config.defaults, cli.seq),
        node_timeout: NODE_IDLE_TIMEOUT,
        echo,
        observer: observer.as_ref(),
    };

    let report = tokio::select! {
        report = mdl_exec::run_plan(&graph, &plan, &config) => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("cancelled by signal; run directory retained at {}", run_dir.display());
            return Ok(130);
        }
    };

    let mut combined: BTreeMap<String, mdl_core::ActionOutputs> = BTreeMap::new();
    for key in &graph.goals {
        if let Some(outputs) = report.outputs_by_action.get(&key.action) {
            combined.insert(key.action.clone(), outputs.clone());
        }
    }
    let json_text = serde_json::to_string_pretty(&combined)?;
    match &cli.out {
        Some(path) => std::fs::write(path, &json_text)
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => println!("{json_text}"),
    }

    if report.succeeded() {
        if !cli.keep_run_dir {
            RunStore::remove_run(&run_dir)?;
        }
        Ok(0)
    } else {
        for (key, message) in &report.failures {
            eprintln!("node {key} failed: {message}");
        }
        Ok(2)
    }
}
