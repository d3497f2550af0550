//! Orders domain (event-sourced).
//!
//! An order is an immutable snapshot of a checked-out cart plus a status
//! lifecycle, payment state and fulfilment deadlines. Building the snapshot
//! (stock re-validation, coupon, numbering) is orchestrated by the checkout
//! service in `commerce-infra`; this crate only enforces what an order itself
//! may become.

pub mod number;
pub mod order;
pub mod sla;
pub mod status;

pub use order::{
    ChangeOrderStatus, Order, OrderCommand, OrderEvent, OrderId, OrderItem, OrderPlaced,
    OrderStatusChanged, PaymentRecorded, PlaceOrder, RecordPayment, StatusHistoryEntry,
};
pub use number::OrderNumberGenerator;
pub use sla::FulfillmentSla;
pub use status::{OrderStatus, PaymentStatus};
