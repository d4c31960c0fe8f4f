//! Run directory layout and lifecycle: `.mdl/runs/<timestamp>-<nanotail>/<node-id>/…`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use crate::meta::{META_FILE_NAME, NodeMeta};

/// Owns the `.mdl/runs` directory under a project root.
#[derive(Debug, Clone)]
pub struct RunStore {
    runs_root: PathBuf,
}

impl RunStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            runs_root: project_root.join(".mdl").join("runs"),
        }
    }

    pub fn runs_root(&self) -> &Path {
        &self.runs_root
    }

    /// Create a new, empty run directory, named so that lexicographic order
    /// matches chronological order.
    pub fn create_run(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.runs_root)
            .with_context(|| format!("failed to create '{}'", self.runs_root.display()))?;
        let name = run_directory_name();
        let path = self.runs_root.join(&name);
        std::fs::create_dir(&path)
            .with_context(|| format!("failed to create run directory '{}'", path.display()))?;
        debug!(run = %name, "created run directory");
        Ok(path)
    }

    /// The most recent run directory, if any — the lexicographically
    /// greatest entry, which is safe because the name's timestamp prefix is
    /// monotonic.
    pub fn latest_run(&self) -> Result<Option<PathBuf>> {
        if !self.runs_root.exists() {
            return Ok(None);
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.runs_root)
            .with_context(|| format!("failed to list '{}'", self.runs_root.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort();
        Ok(entries.pop())
    }

    pub fn node_dir(run_dir: &Path, node_id: &str) -> PathBuf {
        run_dir.join(node_id)
    }

    /// Copy a node's directory verbatim from a prior run into the current
    /// one, iff the prior node succeeded. Returns whether restoration
    /// happened.
    pub fn restore_node(prior_run: &Path, current_run: &Path, node_id: &str) -> Result<bool> {
        let prior_node_dir = Self::node_dir(prior_run, node_id);
        let meta_path = prior_node_dir.join(META_FILE_NAME);
        if !meta_path.exists() {
            return Ok(false);
        }
        let meta = NodeMeta::load(&meta_path)?;
        if !meta.success {
            return Ok(false);
        }
        let target_dir = Self::node_dir(current_run, node_id);
        copy_dir_recursive(&prior_node_dir, &target_dir)?;
        debug!(node = %node_id, "restored node from prior run");
        Ok(true)
    }

    /// Remove a run directory entirely (used when `keep_run_dir` is false
    /// and every node in the run succeeded).
    pub fn remove_run(run_dir: &Path) -> Result<()> {
        if run_dir.exists() {
            std::fs::remove_dir_all(run_dir)
                .with_context(|| format!("failed to remove '{}'", run_dir.display()))?;
        }
        Ok(())
    }
}

fn run_directory_name() -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let nanotail = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{timestamp}-{nanotail:09}")
}

fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)
        .with_context(|| format!("failed to create '{}'", to.display()))?;
    for entry in std::fs::read_dir(from)
        .with_context(|| format!("failed to list '{}'", from.display()))?
    {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)
                .with_context(|| format!("failed to copy into '{}'", dest.display()))?;
        }
    }
    Ok(())
}
