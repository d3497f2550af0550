//! Command execution pipeline for a single aggregate.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the stream and rehydrate the aggregate
//!   ↓
//! 2. Handle the command (pure decision, produces events)
//!   ↓
//! 3. Append with an exact expected version (optimistic concurrency)
//! ```
//!
//! Publication to projections and the bus happens in the services layer,
//! after the append succeeds. Commands that span several aggregates go
//! through [`crate::unit_of_work::UnitOfWork`] instead.

use thiserror::Error;
use uuid::Uuid;

use commerce_core::{AggregateId, AggregateRoot, DomainError, ExpectedVersion};
use commerce_events::Event;

use crate::aggregates::StreamedAggregate;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Business rule failure, including optimistic concurrency conflicts.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Persisting to or reading from the event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Historical payload does not match the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("writer lock poisoned")]
    LockPoisoned,
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Domain(DomainError::Conflict(msg)),
            other => DispatchError::Store(other),
        }
    }
}

/// Load and rehydrate an aggregate. A stream with no events yields the empty
/// aggregate (`exists() == false`).
pub fn load_aggregate<A, S>(store: &S, aggregate_id: AggregateId) -> Result<A, DispatchError>
where
    A: StreamedAggregate,
    S: EventStore + ?Sized,
{
    let history = store.load_stream(aggregate_id)?;
    validate_loaded_stream(aggregate_id, A::AGGREGATE_TYPE, &history)?;

    let mut aggregate = A::empty_for(aggregate_id);
    apply_history(&mut aggregate, &history)?;
    Ok(aggregate)
}

/// Wrap decided events for `aggregate_id`.
pub fn to_uncommitted<A>(
    aggregate_id: AggregateId,
    events: &[A::Event],
) -> Result<Vec<UncommittedEvent>, DispatchError>
where
    A: StreamedAggregate,
{
    events
        .iter()
        .map(|ev| UncommittedEvent::from_typed(aggregate_id, A::AGGREGATE_TYPE, Uuid::now_v7(), ev))
        .collect::<Result<Vec<_>, _>>()
        .map_err(DispatchError::from)
}

/// Load, decide, append for one aggregate.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Returns the committed events (empty when the command was a no-op).
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        command: &A::Command,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: StreamedAggregate,
    {
        let aggregate: A = load_aggregate(&self.store, aggregate_id)?;
        let expected = ExpectedVersion::Exact(aggregate.version());

        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = %aggregate_id,
            events = decided.len(),
            first = decided[0].event_type(),
            "command decided"
        );

        let uncommitted = to_uncommitted::<A>(aggregate_id, &decided)?;
        Ok(self.store.append(uncommitted, expected)?)
    }
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.aggregate_type != aggregate_type {
            return Err(DispatchError::Store(EventStoreError::AggregateTypeMismatch(format!(
                "stream {aggregate_id} is '{}', expected '{aggregate_type}'",
                e.aggregate_type
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "sequence gap in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: StreamedAggregate,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use commerce_catalog::{
        Category, CategoryCommand, CategoryId, CreateCategory, DeactivateCategory,
    };
    use commerce_core::RecordStatus;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    fn create(category_id: CategoryId) -> CategoryCommand {
        CategoryCommand::CreateCategory(CreateCategory {
            category_id,
            name: "Shoes".into(),
            slug: "shoes".into(),
            parent_id: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_and_rehydrates() {
        let store = Arc::new(InMemoryEventStore::new());
        let dispatcher = CommandDispatcher::new(store.clone());
        let id = CategoryId::generate();

        let committed = dispatcher.dispatch::<Category>(id.aggregate_id(), &create(id)).unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].aggregate_type, "catalog.category");

        let deactivate = CategoryCommand::DeactivateCategory(DeactivateCategory {
            category_id: id,
            occurred_at: Utc::now(),
        });
        dispatcher.dispatch::<Category>(id.aggregate_id(), &deactivate).unwrap();

        let loaded: Category = load_aggregate(&store, id.aggregate_id()).unwrap();
        assert_eq!(loaded.version(), 2);
        assert_eq!(loaded.status(), RecordStatus::Inactive);
    }

    #[test]
    fn domain_errors_pass_through() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let id = CategoryId::generate();
        dispatcher.dispatch::<Category>(id.aggregate_id(), &create(id)).unwrap();

        let err = dispatcher.dispatch::<Category>(id.aggregate_id(), &create(id)).unwrap_err();
        assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn store_conflicts_surface_as_domain_conflicts() {
        let err: DispatchError = EventStoreError::Concurrency("stale".into()).into();
        assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));
    }
}
