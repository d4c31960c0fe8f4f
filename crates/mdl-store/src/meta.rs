//! `meta.json`: the per-node record written after a node finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const META_FILE_NAME: &str = "meta.json";
pub const OUTPUT_FILE_NAME: &str = "output.json";
pub const RETAIN_SENTINEL_FILE_NAME: &str = "retain.flag";

/// Recorded once a node's process has exited (or been restored verbatim
/// from a prior run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMeta {
    pub action_name: String,
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl NodeMeta {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read '{}': {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse '{}': {e}", path.display()))
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .map_err(|e| anyhow::anyhow!("failed to write '{}': {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_round_trips_through_json() {
        let now = Utc::now();
        let meta = NodeMeta {
            action_name: "build".into(),
            success: true,
            start_time: now,
            end_time: now,
            duration_seconds: 1.5,
            exit_code: 0,
            error_message: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(META_FILE_NAME);
        meta.save(&path).unwrap();
        let loaded = NodeMeta::load(&path).unwrap();
        assert_eq!(loaded.action_name, "build");
        assert!(loaded.success);
    }
}
