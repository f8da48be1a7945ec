//! Graph loading and display settings.
//!
//! Settings are an explicit value handed to the operations that need them;
//! nothing is read from process-wide state.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Which parts of the catalog `from_catalog` loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadFlags {
    /// The stored relations of the subject's connected component.
    pub relation_cloud: bool,
    /// The stored history of the subject itself.
    pub subject_history: bool,
    /// The stored histories of all leaves found through the relations.
    pub leaves_history: bool,
}

impl LoadFlags {
    pub const ALL: LoadFlags = LoadFlags {
        relation_cloud: true,
        subject_history: true,
        leaves_history: true,
    };

    pub const NONE: LoadFlags = LoadFlags {
        relation_cloud: false,
        subject_history: false,
        leaves_history: false,
    };
}

impl Default for LoadFlags {
    fn default() -> Self {
        LoadFlags::ALL
    }
}

/// Settings for building and displaying image history graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Remove redundant edges before display.
    pub reduce_on_display: bool,
    /// Remove vertices without a stored image before display.
    pub drop_unresolved_on_display: bool,
    pub load_flags: LoadFlags,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            reduce_on_display: true,
            drop_unresolved_on_display: true,
            load_flags: LoadFlags::ALL,
        }
    }
}

impl GraphConfig {
    /// Parses settings from JSON. Missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let config = GraphConfig::default();
        assert!(config.reduce_on_display);
        assert!(config.drop_unresolved_on_display);
        assert_eq!(config.load_flags, LoadFlags::ALL);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            GraphConfig::from_json_str(r#"{"reduce_on_display": false, "load_flags": {"leaves_history": false}}"#)
                .unwrap();
        assert!(!config.reduce_on_display);
        assert!(config.drop_unresolved_on_display);
        assert!(config.load_flags.relation_cloud);
        assert!(!config.load_flags.leaves_history);
    }

    #[test]
    fn invalid_json_is_config_error() {
        assert!(matches!(
            GraphConfig::from_json_str("{not json"),
            Err(GraphError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            GraphConfig::from_file("/nonexistent/imagehistory/config.json"),
            Err(GraphError::Io(_))
        ));
    }
}
