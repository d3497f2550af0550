//! Read models built from committed events.
//!
//! Every projection is:
//! - **Rebuildable**: [`Projections::rebuild`] replays the whole log
//! - **Idempotent**: per-stream cursors skip redelivered envelopes
//! - **Disposable**: the event store stays the source of truth

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use commerce_cart::{CartId, Owner};
use commerce_catalog::{CategoryId, ProductId};
use commerce_events::EventEnvelope;
use commerce_orders::OrderId;

use crate::event_store::{EventStore, EventStoreError};
use crate::read_model::InMemoryKeyedStore;

pub mod carts;
pub mod catalog;
pub mod complaints;
pub mod cursor;
pub mod mirror;
pub mod orders;
pub mod promotions;

pub use carts::CartDirectoryProjection;
pub use catalog::{CategoryProjection, CategoryReadModel, ProductCatalogProjection, ProductReadModel};
pub use complaints::ComplaintsProjection;
pub use orders::{OrderSummary, OrdersProjection};
pub use promotions::{CouponProjection, FlashSaleProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("read model missing for {0}")]
    MissingRecord(String),

    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),
}

type Store<K, V> = Arc<InMemoryKeyedStore<K, V>>;

/// Every read model the services query, fed from one envelope stream.
#[derive(Debug)]
pub struct Projections {
    pub products: ProductCatalogProjection<Store<ProductId, ProductReadModel>>,
    pub categories: CategoryProjection<Store<CategoryId, CategoryReadModel>>,
    pub carts: CartDirectoryProjection<Store<Owner, CartId>>,
    pub orders: OrdersProjection<Store<OrderId, OrderSummary>>,
    pub coupons: CouponProjection,
    pub flash_sales: FlashSaleProjection,
    pub complaints: ComplaintsProjection,
}

impl Projections {
    pub fn in_memory() -> Self {
        Self {
            products: ProductCatalogProjection::new(Arc::new(InMemoryKeyedStore::new())),
            categories: CategoryProjection::new(Arc::new(InMemoryKeyedStore::new())),
            carts: CartDirectoryProjection::new(Arc::new(InMemoryKeyedStore::new())),
            orders: OrdersProjection::new(Arc::new(InMemoryKeyedStore::new())),
            coupons: CouponProjection::new(),
            flash_sales: FlashSaleProjection::new(),
            complaints: ComplaintsProjection::new(),
        }
    }

    /// Route an envelope to every projection; each ignores foreign aggregate types.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.products.apply_envelope(envelope)?;
        self.categories.apply_envelope(envelope)?;
        self.carts.apply_envelope(envelope)?;
        self.orders.apply_envelope(envelope)?;
        self.coupons.apply_envelope(envelope)?;
        self.flash_sales.apply_envelope(envelope)?;
        self.complaints.apply_envelope(envelope)?;
        Ok(())
    }

    pub fn reset(&self) {
        self.products.reset();
        self.categories.reset();
        self.carts.reset();
        self.orders.reset();
        self.coupons.reset();
        self.flash_sales.reset();
        self.complaints.reset();
    }

    /// Drop every read model and replay the full log in commit order.
    pub fn rebuild<S: EventStore + ?Sized>(&self, store: &S) -> Result<u64, ProjectionError> {
        self.reset();
        let mut replayed = 0;
        for stored in store.load_all()? {
            self.apply(&stored.to_envelope())?;
            replayed += 1;
        }
        tracing::info!(events = replayed, "projections rebuilt");
        Ok(replayed)
    }
}

impl Default for Projections {
    fn default() -> Self {
        Self::in_memory()
    }
}
