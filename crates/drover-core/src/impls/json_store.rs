//! JSON file state store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::DroverError;
use crate::ports::StateStore;
use crate::scheduler::PersistedState;

/// Persists the whole snapshot as one JSON document.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact rather than a
/// truncated file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedState>, DroverError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(DroverError::Store(format!("read {:?}: {error}", self.path))),
        };
        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|error| DroverError::Store(format!("decode {:?}: {error}", self.path)))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, state: &PersistedState) -> Result<(), DroverError> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|error| DroverError::Store(format!("encode snapshot: {error}")))?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|error| DroverError::Store(format!("write {tmp:?}: {error}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|error| DroverError::Store(format!("rename {tmp:?}: {error}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        let mut snapshot = PersistedState::default();
        snapshot.completed_count = 3;
        snapshot.paused = true;
        snapshot.next_task_id = 12;
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        // No temp file left behind.
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        let mut first = PersistedState::default();
        first.completed_count = 1;
        store.save(&first).await.unwrap();

        let mut second = PersistedState::default();
        second.completed_count = 2;
        store.save(&second).await.unwrap();

        assert_eq!(store.load().await.unwrap().unwrap().completed_count, 2);
    }

    #[tokio::test]
    async fn corrupt_file_reports_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = JsonFileStore::new(path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DroverError::Store(_)));
    }
}
