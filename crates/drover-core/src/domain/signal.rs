//! External signals and confirmation decisions.

use serde::{Deserialize, Serialize};

use super::{HandleId, Task};

/// Asynchronous event delivered by the completion signal source.
///
/// `Destroyed` may be indistinguishable from a close the scheduler performed
/// itself; the scheduler suppresses self-caused destruction with an
/// intentional-close marker set immediately before it calls `close()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// The resource reported its task as done.
    Done { handle: HandleId },

    /// The resource disappeared without a prior done signal.
    Destroyed { handle: HandleId },
}

/// The three ways a pending confirmation can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The ambiguous close was a legitimate completion.
    Done,

    /// Relaunch the same URL as a fresh active attempt and unpause.
    Reopen,

    /// Drop the record; the scheduler stays paused.
    Ignore,
}

/// An ambiguously-closed task awaiting an external decision.
///
/// At most one exists at a time; a newer ambiguous close displaces the older
/// record (last-write-wins) and the displaced task is routed back through
/// failure handling so no work is silently lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub task: Task,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_use_tagged_wire_shape() {
        let json = serde_json::to_string(&Signal::Done {
            handle: HandleId::new(4),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"DONE","handle":4}"#);
    }

    #[test]
    fn decisions_parse_from_lowercase() {
        let d: Decision = serde_json::from_str(r#""reopen""#).unwrap();
        assert_eq!(d, Decision::Reopen);
    }
}
