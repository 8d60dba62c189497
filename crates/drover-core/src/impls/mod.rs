//! Port implementations: in-memory for development and tests, JSON file for
//! real deployments.

mod json_store;
mod memory_store;

pub use json_store::JsonFileStore;
pub use memory_store::InMemoryStateStore;
