use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use commerce_core::AggregateId;
use commerce_events::EventEnvelope;

use super::ProjectionError;

/// Last applied sequence number per stream.
///
/// Envelopes may arrive more than once (inline apply plus bus redelivery,
/// rebuilds). Anything at or below the cursor is skipped; a gap is an error.
#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// `Ok(true)` when the envelope is the next one for its stream.
    pub fn should_apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let last = self.get(envelope.aggregate_id());
        let found = envelope.sequence_number();
        if found == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found });
        }
        if found <= last {
            return Ok(false);
        }
        if found != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn envelope(aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "test.thing",
            seq,
            "test.happened",
            Utc::now(),
            JsonValue::Null,
        )
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.should_apply(&envelope(id, 1)).unwrap());
        cursors.advance(id, 1);
        assert!(!cursors.should_apply(&envelope(id, 1)).unwrap());
        assert!(matches!(
            cursors.should_apply(&envelope(id, 3)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
    }
}
