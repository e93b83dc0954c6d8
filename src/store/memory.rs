//! In-memory change log

use super::{ChangeStore, StoreError};
use crate::change::Change;
use tokio::sync::RwLock;

/// Keeps serialized records rather than live changes, so loading always
/// goes through deserialization like a real store would.
#[derive(Debug, Default)]
pub struct MemoryChangeStore {
    records: RwLock<Vec<Vec<u8>>>,
}

impl MemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChangeStore for MemoryChangeStore {
    async fn append(&self, change: &Change) -> Result<(), StoreError> {
        let bytes = change.serialize()?;
        self.records.write().await.push(bytes);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Change>, StoreError> {
        let records = self.records.read().await;
        records
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                Change::deserialize(bytes).map_err(|source| StoreError::Corrupt { line: i + 1, source })
            })
            .collect()
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.write().await.clear();
        Ok(())
    }
}
