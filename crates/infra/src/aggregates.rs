//! Stream naming for every event-sourced aggregate in the workspace.

use serde::Serialize;
use serde::de::DeserializeOwned;

use commerce_cart::{Cart, CartId};
use commerce_catalog::{Category, CategoryId, Product, ProductId};
use commerce_core::{Aggregate, AggregateId, DomainError};
use commerce_events::Event;
use commerce_orders::{Order, OrderId};
use commerce_promotions::{Coupon, CouponId, FlashSale, FlashSaleId};
use commerce_support::{Complaint, ComplaintId};

/// An aggregate the dispatcher and unit of work can load and persist.
pub trait StreamedAggregate:
    Aggregate<Error = DomainError, Event: Event + Serialize + DeserializeOwned> + Sized
{
    /// Stored on every event and fixed for the life of the stream.
    const AGGREGATE_TYPE: &'static str;

    fn empty_for(aggregate_id: AggregateId) -> Self;

    fn stream_id(&self) -> AggregateId;
}

macro_rules! streamed {
    ($aggregate:ty, $id:ident, $name:literal) => {
        impl StreamedAggregate for $aggregate {
            const AGGREGATE_TYPE: &'static str = $name;

            fn empty_for(aggregate_id: AggregateId) -> Self {
                <$aggregate>::empty($id::new(aggregate_id))
            }

            fn stream_id(&self) -> AggregateId {
                self.id_typed().aggregate_id()
            }
        }
    };
}

streamed!(Product, ProductId, "catalog.product");
streamed!(Category, CategoryId, "catalog.category");
streamed!(Cart, CartId, "cart.cart");
streamed!(Order, OrderId, "orders.order");
streamed!(Coupon, CouponId, "promotions.coupon");
streamed!(FlashSale, FlashSaleId, "promotions.flash_sale");
streamed!(Complaint, ComplaintId, "support.complaint");
