//! The normalized document contract fed to the core by the (out-of-scope)
//! Markdown front-end.
//!
//! The front-end's job is to parse Markdown action declarations and emit a
//! [`Document`]. This module defines that narrow contract and a loader for
//! the pre-normalized JSON shape the front-end is expected to produce; it is
//! not a Markdown parser.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{ActionDefinition, AxisDefinition};

/// Environment variables the document declares as exported to every child,
/// and the subset forwarded from the parent process when present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBlock {
    #[serde(default)]
    pub exported: Vec<String>,
    #[serde(default)]
    pub passthrough: Vec<String>,
}

/// A normalized document: the output of ingesting one or more Markdown
/// definition files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub axes: Vec<AxisDefinition>,
    #[serde(default)]
    pub environment: EnvironmentBlock,
}

impl Document {
    pub fn find_action(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn find_axis(&self, name: &str) -> Option<&AxisDefinition> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Document-ingestion invariants: unique action names.
    ///
    /// At-most-one-default-per-axis is enforced by `AxisDefinition.default`
    /// being an `Option<String>`, not a list — a front-end that parsed two
    /// `default` annotations must resolve that before normalizing.
    pub fn validate_ingestion(&self) -> Result<(), crate::error::MdlError> {
        let mut seen = std::collections::HashSet::new();
        for action in &self.actions {
            if !seen.insert(&action.name) {
                return Err(crate::error::MdlError::DuplicateAction(
                    action.name.clone(),
                ));
            }
        }
        Ok(())
    }
}

/// Load a normalized [`Document`] from a pre-normalized JSON file.
///
/// This is the narrow contract the Markdown front-end is expected to emit;
/// it performs no Markdown parsing of its own.
pub fn load_normalized(path: &Path) -> anyhow::Result<Document> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read document '{}': {e}", path.display()))?;
    let document: Document = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("failed to parse document '{}': {e}", path.display()))?;
    document.validate_ingestion()?;
    Ok(document)
}
