//! Durable storage boundary for Wayfinder flows.
//!
//! Defines the [`FlowStore`] trait (optimistic-concurrency saves keyed by the
//! durable business `flow_id`), the dependent/audit record types, an
//! in-memory backend used by tests and the local server, and a
//! backend-agnostic conformance suite any implementation can run.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{DependentRecord, TransitionRecord};
pub use traits::FlowStore;
