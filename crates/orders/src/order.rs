use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_cart::{CartId, Owner};
use commerce_catalog::{ProductId, VariantId};
use commerce_core::{Address, Aggregate, AggregateRoot, DomainError, Money, UserId};
use commerce_events::Event;
use commerce_pricing::{CartTotals, PricedLine, compute_line_total};
use commerce_promotions::{CouponCode, FlashSaleId};

use crate::sla::FulfillmentSla;
use crate::status::{OrderStatus, PaymentStatus};

commerce_core::aggregate_id!(OrderId);

/// Immutable snapshot of a purchased line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub flash_sale: Option<FlashSaleId>,
    /// Sold beyond the stock on hand.
    pub backordered: bool,
}

impl PricedLine for OrderItem {
    fn unit_price(&self) -> Money {
        self.unit_price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub changed_by: Option<UserId>,
    pub at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_number: String,
    placed_by: Option<Owner>,
    source_cart: Option<CartId>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_reference: Option<String>,
    items: Vec<OrderItem>,
    totals: CartTotals,
    billing_address: Option<Address>,
    shipping_address: Option<Address>,
    coupon_code: Option<CouponCode>,
    notes: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    sla: Option<FulfillmentSla>,
    history: Vec<StatusHistoryEntry>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            placed_by: None,
            source_cart: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            items: Vec::new(),
            totals: CartTotals::default(),
            billing_address: None,
            shipping_address: None,
            coupon_code: None,
            notes: None,
            placed_at: None,
            shipped_at: None,
            delivered_at: None,
            sla: None,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn placed_by(&self) -> Option<&Owner> {
        self.placed_by.as_ref()
    }

    pub fn is_owned_by(&self, owner: &Owner) -> bool {
        self.placed_by.as_ref() == Some(owner)
    }

    pub fn source_cart(&self) -> Option<CartId> {
        self.source_cart
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn totals(&self) -> &CartTotals {
        &self.totals
    }

    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn coupon_code(&self) -> Option<&CouponCode> {
        self.coupon_code.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn sla(&self) -> Option<FulfillmentSla> {
        self.sla
    }

    pub fn history(&self) -> &[StatusHistoryEntry] {
        &self.history
    }

    /// Still waiting to ship after the promised ship-by date.
    pub fn is_shipment_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        ) && self.sla.is_some_and(|sla| now > sla.ship_by)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Carries a fully-priced snapshot; the checkout service is responsible for
/// stock, coupon and numbering. The aggregate re-checks that the snapshot is
/// internally consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub placed_by: Owner,
    pub source_cart: CartId,
    pub items: Vec<OrderItem>,
    pub totals: CartTotals,
    pub billing_address: Address,
    pub shipping_address: Address,
    pub coupon_code: Option<CouponCode>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub changed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeStatus(ChangeOrderStatus),
    RecordPayment(RecordPayment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_number: String,
    pub placed_by: Owner,
    pub source_cart: CartId,
    pub items: Vec<OrderItem>,
    pub totals: CartTotals,
    pub billing_address: Address,
    pub shipping_address: Address,
    pub coupon_code: Option<CouponCode>,
    pub notes: Option<String>,
    pub sla: FulfillmentSla,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub notes: Option<String>,
    pub changed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub order_id: OrderId,
    pub previous: PaymentStatus,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusChanged(OrderStatusChanged),
    PaymentRecorded(PaymentRecorded),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::StatusChanged(_) => "orders.order.status_changed",
            OrderEvent::PaymentRecorded(_) => "orders.order.payment_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::PaymentRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.placed_by = Some(e.placed_by.clone());
                self.source_cart = Some(e.source_cart);
                self.status = OrderStatus::Pending;
                self.payment_status = PaymentStatus::Pending;
                self.items = e.items.clone();
                self.totals = e.totals;
                self.billing_address = Some(e.billing_address.clone());
                self.shipping_address = Some(e.shipping_address.clone());
                self.coupon_code = e.coupon_code.clone();
                self.notes = e.notes.clone();
                self.placed_at = Some(e.occurred_at);
                self.sla = Some(e.sla);
                self.history = vec![StatusHistoryEntry {
                    status: OrderStatus::Pending,
                    notes: Some("Order placed".to_string()),
                    changed_by: e.placed_by.user_id(),
                    at: e.occurred_at,
                }];
                self.created = true;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                match e.to {
                    OrderStatus::Shipped => self.shipped_at = Some(e.occurred_at),
                    OrderStatus::Delivered => self.delivered_at = Some(e.occurred_at),
                    OrderStatus::Refunded => self.payment_status = PaymentStatus::Refunded,
                    _ => {}
                }
                self.history.push(StatusHistoryEntry {
                    status: e.to,
                    notes: e.notes.clone(),
                    changed_by: e.changed_by,
                    at: e.occurred_at,
                });
            }
            OrderEvent::PaymentRecorded(e) => {
                self.payment_status = e.status;
                if e.reference.is_some() {
                    self.payment_reference = e.reference.clone();
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("order"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order_number cannot be empty"));
        }
        cmd.billing_address.validate()?;
        cmd.shipping_address.validate()?;

        let mut subtotal = Money::ZERO;
        let mut total_items: u32 = 0;
        for (idx, item) in cmd.items.iter().enumerate() {
            if usize::try_from(item.line_no).ok() != Some(idx + 1) {
                return Err(DomainError::invariant("order lines must be numbered from 1"));
            }
            if item.quantity == 0 {
                return Err(DomainError::validation("order line quantity must be at least 1"));
            }
            if compute_line_total(item.unit_price, item.quantity)? != item.total_price {
                return Err(DomainError::invariant(format!(
                    "line {} total does not match unit price times quantity",
                    item.line_no
                )));
            }
            subtotal = subtotal.checked_add(item.total_price)?;
            total_items = total_items.saturating_add(item.quantity);
        }
        if subtotal != cmd.totals.subtotal || total_items != cmd.totals.total_items {
            return Err(DomainError::invariant("order totals do not match its lines"));
        }

        let has_backorder = cmd.items.iter().any(|i| i.backordered);

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            placed_by: cmd.placed_by.clone(),
            source_cart: cmd.source_cart,
            items: cmd.items.clone(),
            totals: cmd.totals,
            billing_address: cmd.billing_address.clone(),
            shipping_address: cmd.shipping_address.clone(),
            coupon_code: cmd.coupon_code.clone(),
            notes: cmd.notes.clone(),
            sla: FulfillmentSla::for_order(cmd.occurred_at, has_backorder),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeOrderStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {} to {}",
                self.status, cmd.status
            )));
        }
        if cmd.status == OrderStatus::Refunded && !self.payment_status.is_settled() {
            return Err(DomainError::invariant("order has no settled payment to refund"));
        }

        Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            notes: cmd.notes.clone(),
            changed_by: cmd.changed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if !self.payment_status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot record payment {:?} after {:?}",
                cmd.status, self.payment_status
            )));
        }
        if cmd.status == PaymentStatus::Paid && !self.status.holds_stock() {
            return Err(DomainError::invariant("cannot take payment for a cancelled order"));
        }

        Ok(vec![OrderEvent::PaymentRecorded(PaymentRecorded {
            order_id: cmd.order_id,
            previous: self.payment_status,
            status: cmd.status,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::SessionKey;
    use commerce_events::execute;

    fn address() -> Address {
        Address {
            full_name: "Grace Hopper".into(),
            line1: "1 Compiler Way".into(),
            line2: None,
            city: "Arlington".into(),
            state: Some("VA".into()),
            postal_code: "22201".into(),
            country: "US".into(),
            phone: None,
        }
    }

    fn line(line_no: u32, cents: u64, quantity: u32) -> OrderItem {
        OrderItem {
            line_no,
            product_id: ProductId::generate(),
            variant_id: None,
            product_name: format!("Item {line_no}"),
            product_sku: format!("SKU-{line_no}"),
            quantity,
            unit_price: Money::from_minor(cents),
            total_price: Money::from_minor(cents * u64::from(quantity)),
            flash_sale: None,
            backordered: false,
        }
    }

    fn totals_for(items: &[OrderItem]) -> CartTotals {
        commerce_pricing::compute_cart_totals(items, &Default::default()).unwrap()
    }

    fn place_cmd(id: OrderId, items: Vec<OrderItem>) -> PlaceOrder {
        PlaceOrder {
            order_id: id,
            order_number: "ORD202610160001".into(),
            placed_by: Owner::User(UserId::new()),
            source_cart: CartId::generate(),
            totals: totals_for(&items),
            items,
            billing_address: address(),
            shipping_address: address(),
            coupon_code: None,
            notes: None,
            occurred_at: Utc::now(),
        }
    }

    fn placed_order() -> Order {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        let cmd = OrderCommand::PlaceOrder(place_cmd(id, vec![line(1, 1250, 2), line(2, 500, 1)]));
        execute(&mut order, &cmd).unwrap();
        order
    }

    fn change(order: &mut Order, status: OrderStatus) -> Result<Vec<OrderEvent>, DomainError> {
        let cmd = OrderCommand::ChangeStatus(ChangeOrderStatus {
            order_id: order.id_typed(),
            status,
            notes: None,
            changed_by: None,
            occurred_at: Utc::now(),
        });
        execute(order, &cmd)
    }

    fn pay(order: &mut Order, status: PaymentStatus) -> Result<Vec<OrderEvent>, DomainError> {
        let cmd = OrderCommand::RecordPayment(RecordPayment {
            order_id: order.id_typed(),
            status,
            reference: Some("pi_123".into()),
            occurred_at: Utc::now(),
        });
        execute(order, &cmd)
    }

    #[test]
    fn placing_creates_pending_order_with_history_and_sla() {
        let order = placed_order();

        assert!(order.exists());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.totals().subtotal, Money::from_minor(3000));
        assert_eq!(order.history().len(), 1);
        assert_eq!(order.history()[0].status, OrderStatus::Pending);

        let placed = order.placed_at().unwrap();
        let sla = order.sla().unwrap();
        assert_eq!(sla.ship_by, placed + chrono::Duration::days(2));
        assert_eq!(sla.deliver_by, placed + chrono::Duration::days(5));
    }

    #[test]
    fn backordered_line_extends_delivery_deadline() {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        let mut item = line(1, 1000, 1);
        item.backordered = true;
        let cmd = OrderCommand::PlaceOrder(place_cmd(id, vec![item]));
        execute(&mut order, &cmd).unwrap();

        let placed = order.placed_at().unwrap();
        assert_eq!(order.sla().unwrap().deliver_by, placed + chrono::Duration::days(10));
    }

    #[test]
    fn empty_order_is_rejected() {
        let id = OrderId::generate();
        let order = Order::empty(id);
        let cmd = OrderCommand::PlaceOrder(place_cmd(id, vec![]));
        assert_eq!(order.handle(&cmd).unwrap_err(), DomainError::EmptyCart);
    }

    #[test]
    fn inconsistent_snapshot_is_rejected() {
        let id = OrderId::generate();
        let order = Order::empty(id);

        let mut bad_line = line(1, 1000, 2);
        bad_line.total_price = Money::from_minor(1999);
        let mut cmd = place_cmd(id, vec![line(1, 1000, 2)]);
        cmd.items = vec![bad_line];
        assert!(matches!(
            order.handle(&OrderCommand::PlaceOrder(cmd)),
            Err(DomainError::InvariantViolation(_))
        ));

        let mut cmd = place_cmd(id, vec![line(1, 1000, 2)]);
        cmd.totals.subtotal = Money::from_minor(1);
        assert!(matches!(
            order.handle(&OrderCommand::PlaceOrder(cmd)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn guest_orders_record_no_user_in_history() {
        let id = OrderId::generate();
        let mut order = Order::empty(id);
        let mut cmd = place_cmd(id, vec![line(1, 100, 1)]);
        let session = Owner::Session(SessionKey::parse("guest-abc").unwrap());
        cmd.placed_by = session.clone();
        execute(&mut order, &OrderCommand::PlaceOrder(cmd)).unwrap();

        assert!(order.is_owned_by(&session));
        assert!(order.history()[0].changed_by.is_none());
    }

    #[test]
    fn fulfilment_path_stamps_dates_and_history() {
        let mut order = placed_order();
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            change(&mut order, status).unwrap();
        }

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.shipped_at().is_some());
        assert!(order.delivered_at().is_some());
        assert_eq!(order.history().len(), 5);
    }

    #[test]
    fn illegal_transition_is_rejected_without_state_change() {
        let mut order = placed_order();
        let version = order.version();

        assert!(matches!(
            change(&mut order, OrderStatus::Delivered),
            Err(DomainError::InvariantViolation(_))
        ));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.version(), version);
    }

    #[test]
    fn refund_requires_settled_payment() {
        let mut order = placed_order();
        change(&mut order, OrderStatus::Confirmed).unwrap();
        assert!(change(&mut order, OrderStatus::Refunded).is_err());

        pay(&mut order, PaymentStatus::Paid).unwrap();
        assert_eq!(order.payment_reference(), Some("pi_123"));
        change(&mut order, OrderStatus::Refunded).unwrap();

        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert!(change(&mut order, OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn cancelled_order_cannot_be_paid() {
        let mut order = placed_order();
        change(&mut order, OrderStatus::Cancelled).unwrap();
        assert!(pay(&mut order, PaymentStatus::Paid).is_err());
        pay(&mut order, PaymentStatus::Failed).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
    }

    #[test]
    fn overdue_shipment_is_detected() {
        let order = placed_order();
        let placed = order.placed_at().unwrap();
        assert!(!order.is_shipment_overdue(placed + chrono::Duration::days(1)));
        assert!(order.is_shipment_overdue(placed + chrono::Duration::days(3)));
    }
}
