//! Ports: the seams between the scheduler and its external collaborators.
//!
//! Each trait hides one collaborator (browser/tab driver, durable storage,
//! wall clock) so the core stays testable and the collaborators swappable.

mod clock;
mod launcher;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use launcher::ResourceLauncher;
pub use store::StateStore;
