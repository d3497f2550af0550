use serde_json::Value as JsonValue;

use commerce_cart::{Cart, CartEvent, CartId, Owner};
use commerce_events::EventEnvelope;

use crate::aggregates::StreamedAggregate;
use crate::projections::ProjectionError;
use crate::projections::cursor::StreamCursors;
use crate::read_model::{InMemoryKeyedStore, KeyedStore};

/// Which cart is currently active for each owner.
///
/// A cart leaves the directory once it is merged or checked out, so the next
/// lookup for that owner opens a fresh one.
#[derive(Debug)]
pub struct CartDirectoryProjection<S>
where
    S: KeyedStore<Owner, CartId>,
{
    active: S,
    owners: InMemoryKeyedStore<CartId, Owner>,
    cursors: StreamCursors,
}

impl<S> CartDirectoryProjection<S>
where
    S: KeyedStore<Owner, CartId>,
{
    pub fn new(active: S) -> Self {
        Self {
            active,
            owners: InMemoryKeyedStore::new(),
            cursors: StreamCursors::new(),
        }
    }

    pub fn active_cart(&self, owner: &Owner) -> Option<CartId> {
        self.active.get(owner)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Cart::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: CartEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            CartEvent::CartOpened(e) => {
                self.owners.upsert(e.cart_id, e.owner.clone());
                self.active.upsert(e.owner, e.cart_id);
            }
            CartEvent::CartDeactivated(e) => {
                if let Some(owner) = self.owners.get(&e.cart_id) {
                    if self.active.get(&owner) == Some(e.cart_id) {
                        self.active.remove(&owner);
                    }
                }
            }
            _ => {}
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn reset(&self) {
        self.active.clear();
        self.owners.clear();
        self.cursors.clear();
    }
}
