//! Read-model storage for projections.

pub mod keyed_store;

pub use keyed_store::{InMemoryKeyedStore, KeyedStore};
