//! Persistence for serialized changes
//!
//! Stores keep changes in the order they were appended. Each change goes
//! through the JSON wire record, so derived sets are never persisted.

pub mod file;
pub mod memory;

pub use file::FileChangeStore;
pub use memory::MemoryChangeStore;

use crate::change::{Change, ChangeError};
use crate::config::StoreConfig;
use thiserror::Error;

/// Error types for change stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Change error: {0}")]
    Change(#[from] ChangeError),

    #[error("Corrupt record at line {line}: {source}")]
    Corrupt { line: usize, source: ChangeError },
}

/// Trait for change logs
#[async_trait::async_trait]
pub trait ChangeStore: Send + Sync {
    /// Append a change to the end of the log
    async fn append(&self, change: &Change) -> Result<(), StoreError>;

    /// Load every change, oldest first
    async fn load_all(&self) -> Result<Vec<Change>, StoreError>;

    /// Number of stored changes
    async fn len(&self) -> Result<usize, StoreError>;

    /// Remove every change
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Build the store described by a config
pub fn open_store(config: &StoreConfig) -> Box<dyn ChangeStore> {
    match &config.path {
        Some(path) => Box::new(FileChangeStore::new(path.clone())),
        None => Box::new(MemoryChangeStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeInfo, Operation, RandomIds};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> Change {
        Change::new(
            &RandomIds,
            &[Operation::create(json!({ "id": "p1", "type": "paragraph" }))],
            None,
            None,
            ChangeInfo::new(),
        )
    }

    #[tokio::test]
    async fn test_open_store_without_path_is_in_memory() {
        let store = open_store(&StoreConfig::default());
        store.append(&sample()).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_store_with_path_persists() {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            path: Some(dir.path().join("changes.jsonl")),
        };
        let change = sample();
        open_store(&config).append(&change).await.unwrap();

        let loaded = open_store(&config).load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), change.id());
    }
}
