use std::collections::HashMap;
use std::sync::RwLock;

use commerce_core::AggregateId;

use super::r#trait::{
    EventStore, EventStoreError, StoredEvent, StreamAppend, ensure_distinct_streams,
};

#[derive(Debug, Default)]
struct Streams {
    by_aggregate: HashMap<AggregateId, Vec<StoredEvent>>,
    /// Commit order across all streams.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        ensure_distinct_streams(&batch)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        // Check every stream before writing any of them.
        for append in &batch {
            let stream = streams
                .by_aggregate
                .get(&append.aggregate_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let current = Self::current_version(stream);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {} expected {:?}, found {current}",
                    append.aggregate_id, append.expected_version
                )));
            }
            if let Some(existing) = stream.first() {
                if existing.aggregate_type != append.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, append.aggregate_type
                    )));
                }
            }
        }

        let mut committed = Vec::new();
        for append in batch {
            let stream = streams.by_aggregate.entry(append.aggregate_id).or_default();
            let mut next = Self::current_version(stream) + 1;
            let mut stored_batch = Vec::with_capacity(append.events.len());
            for e in append.events {
                stored_batch.push(StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                });
                next += 1;
            }
            stream.extend(stored_batch.iter().cloned());
            committed.extend(stored_batch);
        }
        streams.log.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams
            .by_aggregate
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        Ok(streams.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use commerce_core::ExpectedVersion;

    use super::*;
    use crate::event_store::UncommittedEvent;

    fn event(aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    fn append(
        aggregate_id: AggregateId,
        expected: ExpectedVersion,
        count: usize,
    ) -> StreamAppend {
        StreamAppend {
            aggregate_id,
            aggregate_type: "test.thing".to_string(),
            expected_version: expected,
            events: (0..count).map(|_| event(aggregate_id, "test.thing")).collect(),
        }
    }

    #[test]
    fn sequence_numbers_are_per_stream_and_gap_free() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();

        store.append_batch(vec![append(a, ExpectedVersion::Exact(0), 2)]).unwrap();
        let more = store.append_batch(vec![append(a, ExpectedVersion::Exact(2), 1)]).unwrap();

        assert_eq!(more[0].sequence_number, 3);
        let seqs: Vec<u64> = store.load_stream(a).unwrap().iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn stale_stream_rejects_the_whole_batch() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();
        store.append_batch(vec![append(b, ExpectedVersion::Exact(0), 1)]).unwrap();

        let err = store
            .append_batch(vec![
                append(a, ExpectedVersion::Exact(0), 1),
                append(b, ExpectedVersion::Exact(0), 1),
            ])
            .unwrap_err();

        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert!(store.load_stream(a).unwrap().is_empty());
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_streams_in_a_batch_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let err = store
            .append_batch(vec![
                append(a, ExpectedVersion::Exact(0), 1),
                append(a, ExpectedVersion::Exact(1), 1),
            ])
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
    }

    #[test]
    fn aggregate_type_is_fixed_per_stream() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        store.append(vec![event(a, "test.thing")], ExpectedVersion::Any).unwrap();

        let err = store
            .append(vec![event(a, "test.other")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[test]
    fn load_all_follows_commit_order() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();
        store.append(vec![event(b, "test.thing")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(a, "test.thing")], ExpectedVersion::Any).unwrap();

        let order: Vec<AggregateId> = store.load_all().unwrap().iter().map(|e| e.aggregate_id).collect();
        assert_eq!(order, vec![b, a]);
    }
}
