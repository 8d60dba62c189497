//! State store port: durable whole-snapshot persistence.

use async_trait::async_trait;

use crate::error::DroverError;
use crate::scheduler::PersistedState;

/// Durable storage for the scheduler snapshot.
///
/// The contract is read-all-on-start, write-all-on-every-mutation: every
/// scheduler operation persists its result before returning, so any state
/// observed after an operation completes is durable. Store failures must be
/// reported (not swallowed); the scheduler propagates them to the caller of
/// the triggering operation.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted snapshot, or `None` on first run.
    async fn load(&self) -> Result<Option<PersistedState>, DroverError>;

    /// Replace the persisted snapshot.
    async fn save(&self, state: &PersistedState) -> Result<(), DroverError>;
}
