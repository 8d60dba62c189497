//! Domain model: identifiers, the task record, and external signal shapes.

mod ids;
mod signal;
mod task;

pub use ids::{HandleId, TaskId};
pub use signal::{Decision, PendingConfirmation, Signal};
pub use task::Task;
