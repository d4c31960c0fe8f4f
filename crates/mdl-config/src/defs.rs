//! Definition-file discovery: resolving `--defs=<glob>` to a sorted list of
//! Markdown files the (out-of-scope) front-end will parse and normalize.

use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_DEFS_GLOB: &str = ".mdl/defs/**/*.md";

/// Resolve a `--defs` glob pattern (relative to `root`) to the sorted set of
/// matching files. Deterministic ordering matters: it feeds the front-end's
/// ingestion order, which in turn drives "first duplicate wins" diagnostics.
pub fn discover_defs(root: &std::path::Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = root.join(pattern);
    let pattern_str = full_pattern
        .to_str()
        .context("--defs pattern is not valid UTF-8")?;

    let mut matches: Vec<PathBuf> = glob::glob(pattern_str)
        .with_context(|| format!("invalid --defs glob pattern '{pattern}'"))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_markdown_files_under_default_glob() {
        let root = tempfile::tempdir().unwrap();
        let defs_dir = root.path().join(".mdl/defs/sub");
        std::fs::create_dir_all(&defs_dir).unwrap();
        std::fs::write(defs_dir.join("b.md"), "# b").unwrap();
        std::fs::write(defs_dir.join("a.md"), "# a").unwrap();
        std::fs::write(defs_dir.join("ignore.txt"), "nope").unwrap();

        let found = discover_defs(root.path(), DEFAULT_DEFS_GLOB).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.md"));
        assert!(found[1].ends_with("b.md"));
    }

    #[test]
    fn empty_glob_yields_empty_list_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let found = discover_defs(root.path(), DEFAULT_DEFS_GLOB).unwrap();
        assert!(found.is_empty());
    }
}
