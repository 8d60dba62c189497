//! Domain identifiers (strongly-typed IDs).
//!
//! Task ids are counter-assigned by the scheduler state and monotonic for the
//! lifetime of the process (never reset per batch, so successive enqueue calls
//! cannot collide). Handle ids are assigned by the resource launcher and are
//! opaque to the scheduler; it only ever compares them for identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a Task (one unit of queued work targeting one URL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Identifier of an external resource handle (e.g. a browser tab).
///
/// Produced by the [`ResourceLauncher`](crate::ports::ResourceLauncher) on a
/// successful open; the scheduler never fabricates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(TaskId::new(3).to_string(), "task-3");
        assert_eq!(HandleId::new(17).to_string(), "handle-17");
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        let id = TaskId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_are_ordered_by_value() {
        assert!(TaskId::new(1) < TaskId::new(2));
        assert!(HandleId::new(5) > HandleId::new(4));
    }
}
