use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use commerce_cart::Owner;
use commerce_core::Money;
use commerce_events::EventEnvelope;
use commerce_orders::{Order, OrderEvent, OrderId, OrderStatus, PaymentStatus};

use crate::aggregates::StreamedAggregate;
use crate::projections::ProjectionError;
use crate::projections::cursor::StreamCursors;
use crate::read_model::{InMemoryKeyedStore, KeyedStore};

/// Order list row (order history, admin dashboard).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: String,
    pub placed_by: Owner,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Money,
    pub total_items: u32,
    pub placed_at: DateTime<Utc>,
    pub ship_by: DateTime<Utc>,
    pub deliver_by: DateTime<Utc>,
}

#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: KeyedStore<OrderId, OrderSummary>,
{
    store: S,
    by_number: InMemoryKeyedStore<String, OrderId>,
    cursors: StreamCursors,
}

impl<S> OrdersProjection<S>
where
    S: KeyedStore<OrderId, OrderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_number: InMemoryKeyedStore::new(),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderSummary> {
        self.store.get(order_id)
    }

    pub fn find_by_number(&self, order_number: &str) -> Option<OrderSummary> {
        let order_id = self.by_number.get(&order_number.to_string())?;
        self.store.get(&order_id)
    }

    /// Newest first.
    pub fn list_for(&self, owner: &Owner) -> Vec<OrderSummary> {
        let mut items: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|o| &o.placed_by == owner)
            .collect();
        items.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        items
    }

    pub fn list_all(&self) -> Vec<OrderSummary> {
        let mut items = self.store.list();
        items.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        items
    }

    /// Every order number ever placed (seeds the number generator on start).
    pub fn order_numbers(&self) -> Vec<String> {
        self.store.list().into_iter().map(|o| o.order_number).collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Order::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.by_number.upsert(e.order_number.clone(), e.order_id);
                self.store.upsert(
                    e.order_id,
                    OrderSummary {
                        order_id: e.order_id,
                        order_number: e.order_number,
                        placed_by: e.placed_by,
                        status: OrderStatus::Pending,
                        payment_status: PaymentStatus::Pending,
                        total: e.totals.total,
                        total_items: e.totals.total_items,
                        placed_at: e.occurred_at,
                        ship_by: e.sla.ship_by,
                        deliver_by: e.sla.deliver_by,
                    },
                );
            }
            OrderEvent::StatusChanged(e) => {
                let mut row = self.row(e.order_id)?;
                row.status = e.to;
                if e.to == OrderStatus::Refunded {
                    row.payment_status = PaymentStatus::Refunded;
                }
                self.store.upsert(e.order_id, row);
            }
            OrderEvent::PaymentRecorded(e) => {
                let mut row = self.row(e.order_id)?;
                row.payment_status = e.status;
                self.store.upsert(e.order_id, row);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn row(&self, order_id: OrderId) -> Result<OrderSummary, ProjectionError> {
        self.store
            .get(&order_id)
            .ok_or_else(|| ProjectionError::MissingRecord(format!("order {order_id}")))
    }

    pub fn reset(&self) {
        self.store.clear();
        self.by_number.clear();
        self.cursors.clear();
    }
}
