use thiserror::Error;

use crate::domain::TaskId;

/// Crate-wide error type.
///
/// Taxonomy note: launch failures and ambiguous closes are *not* represented
/// here. They are absorbed by retry accounting and the pending-confirmation
/// record respectively; only faults the caller must act on surface as errors.
#[derive(Debug, Error)]
pub enum DroverError {
    /// The persistent state store failed to read or write. Propagated so
    /// durable and in-memory state never silently diverge.
    #[error("state store: {0}")]
    Store(String),

    /// The resource launcher reported a fault the scheduler cannot route to
    /// retry accounting (e.g. a failed relaunch query during recovery).
    #[error("launcher: {0}")]
    Launcher(String),

    /// A confirmation was delivered while nothing was pending.
    #[error("no pending confirmation")]
    NoPendingConfirmation,

    /// A confirmation named a task other than the pending one.
    #[error("pending confirmation does not match {0}")]
    ConfirmationMismatch(TaskId),
}
