//! Fixed-name global options (§6 grammar). Everything dynamic — axis
//! bindings, per-action args/flags, and `:goal` markers — is not statically
//! declarable (the document defines those names), so it is captured raw in
//! `goal_tokens` and hand-tokenized by `mdl_config::parse_segments`.
//!
//! Consequence: recognized options here must precede the first dynamic/goal
//! token on the command line — once `goal_tokens` starts consuming, clap
//! does not re-recognize a typed flag embedded further on.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mdl", version)]
#[command(about = "Run Markdown-declared actions through the planner-executor core")]
pub struct Cli {
    /// Pre-normalized document JSON (the Markdown front-end's output; see
    /// `mdl_core::document::load_normalized`).
    #[arg(long)]
    pub document: PathBuf,

    /// Definition-file discovery glob, relative to the project root.
    #[arg(long, default_value = mdl_config::DEFAULT_DEFS_GLOB)]
    pub defs: String,

    /// Emit every action with its description, dependencies, and returns; exit 0.
    #[arg(long)]
    pub list_actions: bool,

    /// Print the plan and exit without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Restore successful nodes from the latest prior run.
    #[arg(long = "continue")]
    pub continue_run: bool,

    /// Do not delete the run directory after a fully successful run.
    #[arg(long)]
    pub keep_run_dir: bool,

    /// Skip the hermetic environment wrapper; children inherit the parent environment.
    #[arg(long)]
    pub without_nix: bool,

    /// Stream child output straight to the console, without group markers.
    #[arg(long)]
    pub verbose: bool,

    /// Stream child output wrapped in `::group::<node-id>` / `::endgroup::` markers.
    #[arg(long)]
    pub github_actions: bool,

    /// Plain line-oriented progress logger, instead of the dynamic table.
    #[arg(long)]
    pub simple_log: bool,

    /// Disable ANSI styling in logger output.
    #[arg(long)]
    pub no_color: bool,

    /// Force sequential execution (worker pool of size 1).
    #[arg(long)]
    pub seq: bool,

    /// Write combined goal outputs as JSON to this path (stdout otherwise).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Shell-completion data source: actions | flags | axis-names | axis-values.
    #[arg(long)]
    pub autocomplete: Option<String>,

    /// Axis name to enumerate values for, with `--autocomplete=axis-values`.
    #[arg(long)]
    pub autocomplete_axis: Option<String>,

    /// Global axis/arg/flag bindings followed by one or more `:goal` segments;
    /// hand-tokenized by `mdl_config::parse_segments`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub goal_tokens: Vec<String>,
}
