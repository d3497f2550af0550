use serde_json::Value as JsonValue;

use commerce_core::AggregateId;
use commerce_events::EventEnvelope;

use crate::aggregates::StreamedAggregate;
use crate::projections::ProjectionError;
use crate::projections::cursor::StreamCursors;
use crate::read_model::{InMemoryKeyedStore, KeyedStore};

/// Latest folded state of every stream of one aggregate type.
///
/// Used where queries need the aggregate's own rules (a coupon's validity
/// window, a complaint's deadlines) rather than a flattened row.
#[derive(Debug)]
pub struct AggregateMirror<A> {
    states: InMemoryKeyedStore<AggregateId, A>,
    cursors: StreamCursors,
}

impl<A> AggregateMirror<A>
where
    A: StreamedAggregate + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            states: InMemoryKeyedStore::new(),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, aggregate_id: AggregateId) -> Option<A> {
        self.states.get(&aggregate_id)
    }

    pub fn list(&self) -> Vec<A> {
        self.states.list()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != A::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: A::Event = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let aggregate_id = envelope.aggregate_id();
        let mut state = self
            .states
            .get(&aggregate_id)
            .unwrap_or_else(|| A::empty_for(aggregate_id));
        state.apply(&ev);
        self.states.upsert(aggregate_id, state);

        self.cursors.advance(aggregate_id, envelope.sequence_number());
        Ok(())
    }

    pub fn reset(&self) {
        self.states.clear();
        self.cursors.clear();
    }
}

impl<A> Default for AggregateMirror<A>
where
    A: StreamedAggregate + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
