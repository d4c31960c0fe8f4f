//! User-level defaults: `~/.config/mdl/config.toml`, loaded with
//! fall-through-to-defaults semantics so a fresh install never fails to
//! start for want of a config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_worker_count() -> u32 {
    4
}

fn default_logger_backend() -> String {
    "auto".to_string()
}

/// User-level defaults, overridable by every CLI flag they mirror
/// (`--simple-log`/`--github-actions` over `logger_backend`, an explicit
/// worker-count flag over `worker_count` if one is ever added).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub defaults: GlobalDefaults,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            defaults: GlobalDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalDefaults {
    /// Logger backend selected absent an explicit `--simple-log`/
    /// `--github-actions` flag: "auto" defers to TTY detection, or
    /// "simple"/"live-table"/"github-actions" pins one.
    #[serde(default = "default_logger_backend")]
    pub logger_backend: String,

    /// Bound on concurrently-running nodes absent an explicit override.
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            logger_backend: default_logger_backend(),
            worker_count: default_worker_count(),
        }
    }
}

impl GlobalConfig {
    /// Load from `~/.config/mdl/config.toml`. Returns `Default` if the file
    /// or the config directory itself doesn't exist — a fresh install never
    /// fails to start for want of a config file.
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(Self::default()),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read global config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse global config: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "mdl")
            .context("failed to determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_fallbacks() {
        let config = GlobalConfig::default();
        assert_eq!(config.defaults.logger_backend, "auto");
        assert_eq!(config.defaults.worker_count, 4);
    }

    #[test]
    fn parses_partial_toml_with_defaults_filled_in() {
        let toml_text = "[defaults]\nworker_count = 8\n";
        let config: GlobalConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.defaults.worker_count, 8);
        assert_eq!(config.defaults.logger_backend, "auto");
    }
}
