//! Append-only event store boundary.
//!
//! Streams are keyed by `(supplier_id, aggregate_id)`. Nothing here assumes a
//! particular storage engine; the in-memory store backs tests and single-node
//! deployments.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
