//! drover-core
//!
//! A bounded-concurrency scheduler for long-running remote jobs: each task
//! opens an external resource (originally a browser tab) and waits for an
//! external signal that it is done. State is persisted after every mutation
//! and reconciled against live resources at startup, so a process restart
//! neither loses nor duplicates work.
//!
//! # Module layout
//! - **domain**: task record, identifiers, signal and decision shapes
//! - **ports**: abstraction layer (ResourceLauncher, StateStore, Clock)
//! - **scheduler**: dispatch loop, retry accounting, completion protocol,
//!   startup reconciliation
//! - **control**: the command/response contract for a frontend
//! - **impls**: in-memory and JSON-file state stores

pub mod config;
pub mod control;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::DroverError;
pub use scheduler::Scheduler;
