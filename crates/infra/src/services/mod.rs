//! Application services: one method per use case.
//!
//! Every write runs as a single unit of work under one writer lock:
//!
//! ```text
//! lock writer
//!   ↓
//! load aggregates, decide commands (nothing persisted yet)
//!   ↓
//! append every touched stream atomically, guarded by load-time versions
//!   ↓
//! apply committed envelopes to projections, publish them on the bus
//! ```
//!
//! Projections are updated inline so a caller reads its own writes; bus
//! subscribers (notifications) are fire-and-forget.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value as JsonValue;

use commerce_core::{AggregateId, DailySequence};
use commerce_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use commerce_orders::OrderNumberGenerator;
use commerce_pricing::PricingPolicy;

use crate::aggregates::StreamedAggregate;
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::Projections;
use crate::unit_of_work::UnitOfWork;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod promotions;
pub mod support;

pub use cart::{CartLineView, CartSummary};
pub use checkout::PlaceOrderRequest;
pub use error::{ServiceError, ServiceResult};

pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

pub const COMPLAINT_NUMBER_PREFIX: &str = "CMP";

#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub order_number_prefix: String,
    pub pricing: PricingPolicy,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: OrderNumberGenerator::DEFAULT_PREFIX.to_string(),
            pricing: PricingPolicy::default(),
        }
    }
}

pub struct CommerceServices {
    store: Arc<dyn EventStore>,
    bus: Arc<EnvelopeBus>,
    projections: Arc<Projections>,
    writer: Mutex<()>,
    order_numbers: Mutex<OrderNumberGenerator>,
    complaint_numbers: Mutex<DailySequence>,
    pricing: PricingPolicy,
}

impl std::fmt::Debug for CommerceServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceServices")
            .field("pricing", &self.pricing)
            .finish_non_exhaustive()
    }
}

impl CommerceServices {
    /// Wire services over `store`, rebuilding every read model from its log
    /// and resuming order/complaint numbering where it left off.
    pub fn new(store: Arc<dyn EventStore>, config: ServicesConfig) -> ServiceResult<Self> {
        let projections = Arc::new(Projections::in_memory());
        projections.rebuild(store.as_ref())?;

        let mut order_numbers = OrderNumberGenerator::new(config.order_number_prefix)?;
        for number in projections.orders.order_numbers() {
            order_numbers.observe(&number);
        }
        let mut complaint_numbers = DailySequence::new(COMPLAINT_NUMBER_PREFIX)?;
        for number in projections.complaints.numbers() {
            complaint_numbers.observe(&number);
        }

        Ok(Self {
            store,
            bus: Arc::new(EnvelopeBus::new()),
            projections,
            writer: Mutex::new(()),
            order_numbers: Mutex::new(order_numbers),
            complaint_numbers: Mutex::new(complaint_numbers),
            pricing: config.pricing,
        })
    }

    pub fn in_memory(config: ServicesConfig) -> ServiceResult<Self> {
        Self::new(Arc::new(InMemoryEventStore::new()), config)
    }

    pub fn projections(&self) -> &Arc<Projections> {
        &self.projections
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }

    fn lock_writer(&self) -> ServiceResult<MutexGuard<'_, ()>> {
        self.writer.lock().map_err(|_| ServiceError::LockPoisoned)
    }

    fn unit_of_work(&self) -> UnitOfWork<'_, dyn EventStore> {
        UnitOfWork::new(self.store.as_ref())
    }

    /// Persist a unit of work and fan its events out.
    fn commit(&self, uow: UnitOfWork<'_, dyn EventStore>) -> ServiceResult<Vec<StoredEvent>> {
        let committed = uow.commit()?;
        self.publish(&committed);
        Ok(committed)
    }

    /// Run one command against one aggregate as its own unit of work.
    fn execute_one<A: StreamedAggregate>(
        &self,
        aggregate_id: AggregateId,
        command: &A::Command,
    ) -> ServiceResult<A> {
        let _writer = self.lock_writer()?;
        self.execute_one_locked(aggregate_id, command)
    }

    /// `execute_one` for callers already holding the writer lock, so a read
    /// model check and the write it guards happen under the same lock.
    fn execute_one_locked<A: StreamedAggregate>(
        &self,
        aggregate_id: AggregateId,
        command: &A::Command,
    ) -> ServiceResult<A> {
        let mut uow = self.unit_of_work();
        let mut aggregate: A = uow.load(aggregate_id)?;
        uow.execute(&mut aggregate, command)?;
        self.commit(uow)?;
        Ok(aggregate)
    }

    fn publish(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let envelope = stored.to_envelope();
            if let Err(err) = self.projections.apply(&envelope) {
                tracing::warn!(
                    event_type = envelope.event_type(),
                    aggregate_id = %envelope.aggregate_id(),
                    error = %err,
                    "projection update failed"
                );
            }
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(error = ?err, "event bus publish failed");
            }
        }
    }
}
