//! Configuration for history, persistence and logging

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Undo/redo limits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of changes kept on the undo stack
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

/// Where serialized changes are kept
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Change log file; `None` keeps changes in memory
    pub path: Option<PathBuf>,
}

/// Top-level configuration, usually loaded from a JSON file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocDeltaConfig {
    pub history: HistoryConfig,
    pub store: StoreConfig,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for DocDeltaConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            store: StoreConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl DocDeltaConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
