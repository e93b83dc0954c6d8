//! Append-only change log on the local file system
//!
//! One JSON change record per line.

use super::{ChangeStore, StoreError};
use crate::change::Change;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct FileChangeStore {
    path: PathBuf,
    /// Serializes appends from concurrent tasks
    write_lock: Mutex<()>,
}

impl FileChangeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio_fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    async fn read_lines(&self) -> Result<Vec<String>, StoreError> {
        match tokio_fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl ChangeStore for FileChangeStore {
    async fn append(&self, change: &Change) -> Result<(), StoreError> {
        let mut line = change.serialize()?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        self.ensure_dir().await?;
        let mut file = tokio_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        log::debug!("appended {} to {}", change, self.path.display());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Change>, StoreError> {
        self.read_lines()
            .await?
            .iter()
            .enumerate()
            .map(|(i, line)| {
                Change::deserialize(line.as_bytes())
                    .map_err(|source| StoreError::Corrupt { line: i + 1, source })
            })
            .collect()
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_lines().await?.len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
