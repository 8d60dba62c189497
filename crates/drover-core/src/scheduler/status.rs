//! Status views reported to the control surface.

use serde::{Deserialize, Serialize};

/// Point-in-time counts by lifecycle position.
///
/// `active` counts launched tasks only; placeholder reservations for
/// launches still in flight are excluded, matching what an operator would
/// consider "running".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub pending: usize,
    pub retrying: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub paused: bool,
    pub max_concurrent: usize,
}

/// Result of an enqueue: how many URLs were accepted into the batch and how
/// many were dropped as malformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    pub accepted: usize,
    pub rejected: usize,
}
