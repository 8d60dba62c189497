//! Resource launcher port: opens and closes external resources.

use async_trait::async_trait;
use url::Url;

use crate::domain::HandleId;
use crate::error::DroverError;

/// Opens, closes, and probes the external resources that tasks run in
/// (browser tabs in the original deployment).
///
/// Design intent:
/// - `open` is asynchronous and fallible; the scheduler reserves a
///   concurrency slot *before* calling it and confirms or releases the
///   reservation afterwards, so the concurrency bound holds across the await.
/// - `close` must be idempotent: closing an already-dead handle is not a
///   scheduler fault and implementations should return `Ok(())`.
/// - `is_live` is the sole crash-recovery signal. At startup the reconciler
///   asks it about every persisted active handle; there is no persisted
///   "crashed" flag.
#[async_trait]
pub trait ResourceLauncher: Send + Sync {
    /// Open a resource for `url`, returning its handle.
    async fn open(&self, url: &Url) -> Result<HandleId, DroverError>;

    /// Close the resource behind `handle`. Idempotent.
    async fn close(&self, handle: HandleId) -> Result<(), DroverError>;

    /// Whether `handle` still refers to a live resource.
    async fn is_live(&self, handle: HandleId) -> bool;
}
