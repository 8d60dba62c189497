//! In-memory state store.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::DroverError;
use crate::ports::StateStore;
use crate::scheduler::PersistedState;

/// Keeps the snapshot in memory. Nothing survives the process; meant for
/// tests and demos, and as the seam reference for real stores.
#[derive(Default)]
pub struct InMemoryStateStore {
    snapshot: Mutex<Option<PersistedState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start pre-populated, as if a previous process had persisted `snapshot`.
    pub fn with_snapshot(snapshot: PersistedState) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<Option<PersistedState>, DroverError> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), DroverError> {
        *self.snapshot.lock().await = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty_and_returns_last_write() {
        let store = InMemoryStateStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut snapshot = PersistedState::default();
        snapshot.completed_count = 7;
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.completed_count, 7);
    }
}
