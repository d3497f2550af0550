use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use commerce_core::{AggregateId, ExpectedVersion};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serialises the payload and captures `event_type`, schema version and
/// business time so subscribers can route without decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream.
///
/// Sequence numbers are per stream, start at 1 and have no gaps. Events from
/// one atomic batch are stored contiguously in the global log, in batch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> commerce_events::EventEnvelope<JsonValue> {
        commerce_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// New events for one stream, guarded by the version the writer read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

impl StreamAppend {
    /// Every event must target this stream and aggregate type.
    pub fn validate(&self) -> Result<(), EventStoreError> {
        for (idx, e) in self.events.iter().enumerate() {
            if e.aggregate_id != self.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} contains an event for {} (index {idx})",
                    self.aggregate_id, e.aggregate_id
                )));
            }
            if e.aggregate_type != self.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {} is '{}', event at index {idx} is '{}'",
                    self.aggregate_id, self.aggregate_type, e.aggregate_type
                )));
            }
        }
        Ok(())
    }
}

/// Reject a batch that names the same stream twice.
pub(crate) fn ensure_distinct_streams(batch: &[StreamAppend]) -> Result<(), EventStoreError> {
    for (idx, append) in batch.iter().enumerate() {
        append.validate()?;
        if batch[..idx]
            .iter()
            .any(|other| other.aggregate_id == append.aggregate_id)
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears twice in one batch",
                append.aggregate_id
            )));
        }
    }
    Ok(())
}

/// Event store operation error.
///
/// These are infrastructure errors (storage, concurrency) as opposed to domain
/// errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Append-only event store.
///
/// One stream per aggregate instance, keyed by `aggregate_id`. Appends are
/// guarded by [`ExpectedVersion`]; a batch spanning several streams is
/// all-or-nothing, so a checkout that touches products, a coupon, an order and
/// a cart either commits every stream or none.
pub trait EventStore: Send + Sync {
    /// Append to several streams atomically. Each stream's expectation is
    /// checked before anything is written. Returns committed events in batch
    /// order.
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load one stream in sequence order (empty when the aggregate was never
    /// created).
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Every committed event in commit order (projection rebuilds).
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append to a single stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let append = StreamAppend {
            aggregate_id: first.aggregate_id,
            aggregate_type: first.aggregate_type.clone(),
            expected_version,
            events,
        };
        self.append_batch(vec![append])
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_batch(batch)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }
}

impl UncommittedEvent {
    /// Wrap a typed domain event, capturing the metadata needed to route and
    /// later deserialise it.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: commerce_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
