//! Event primitives shared by the commerce domain crates.
//!
//! Domain crates implement [`Event`] for their event enums. Infra persists
//! them, wraps committed ones in an [`EventEnvelope`] and fans them out over an
//! [`EventBus`] to projections and the notification dispatcher.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
