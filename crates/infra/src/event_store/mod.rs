//! Append-only event store boundary.
//!
//! The in-memory store backs tests and the default API configuration; the
//! Postgres store is selected with `USE_PERSISTENT_STORES`.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
