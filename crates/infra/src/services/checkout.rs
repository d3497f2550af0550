use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_cart::{CartCommand, DeactivateCart, DeactivationReason, Owner};
use commerce_catalog::{AdjustStock, MovementType, Product, ProductCommand, ProductId};
use commerce_core::{Address, DomainError, UserId};
use commerce_orders::{
    ChangeOrderStatus, FulfillmentSla, Order, OrderCommand, OrderId, OrderItem, OrderStatus,
    PaymentStatus, PlaceOrder, RecordPayment, StatusHistoryEntry,
};
use commerce_pricing::{CartTotals, compute_cart_totals, compute_line_total, compute_totals, validate_add};
use commerce_promotions::{
    Coupon, CouponCode, CouponCommand, FlashSale, FlashSaleCommand, FlashSaleId, RecordSale,
    RedeemCoupon,
};

use super::{CommerceServices, ServiceError, ServiceResult};
use crate::command_dispatcher::load_aggregate;
use crate::event_store::EventStore;
use crate::projections::OrderSummary;
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub billing_address: Address,
    pub shipping_address: Address,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full order as shown to its owner or an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    pub order_id: OrderId,
    pub order_number: String,
    pub placed_by: Option<Owner>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub items: Vec<OrderItem>,
    pub totals: CartTotals,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    pub coupon_code: Option<CouponCode>,
    pub notes: Option<String>,
    pub placed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub sla: Option<FulfillmentSla>,
    pub history: Vec<StatusHistoryEntry>,
}

impl From<&Order> for OrderDetail {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id_typed(),
            order_number: order.order_number().to_string(),
            placed_by: order.placed_by().cloned(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_reference: order.payment_reference().map(str::to_string),
            items: order.items().to_vec(),
            totals: *order.totals(),
            billing_address: order.billing_address().cloned(),
            shipping_address: order.shipping_address().cloned(),
            coupon_code: order.coupon_code().cloned(),
            notes: order.notes().map(str::to_string),
            placed_at: order.placed_at(),
            shipped_at: order.shipped_at(),
            delivered_at: order.delivered_at(),
            sla: order.sla(),
            history: order.history().to_vec(),
        }
    }
}

impl CommerceServices {
    /// Turn the owner's cart into an order.
    ///
    /// Stock checks, stock decrements, coupon and flash-sale counters, the
    /// order itself and the cart deactivation are decided against in-memory
    /// copies and committed as one atomic multi-stream append. Any failure,
    /// including a stream that moved since it was read, persists nothing.
    #[tracing::instrument(skip_all, fields(%owner))]
    pub fn place_order(
        &self,
        owner: &Owner,
        request: PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<OrderDetail> {
        let _writer = self.lock_writer()?;
        let mut numbers = self
            .order_numbers
            .lock()
            .map_err(|_| ServiceError::LockPoisoned)?;

        let mut uow = self.unit_of_work();
        let mut cart = self.existing_cart(&uow, owner)?.ok_or(DomainError::EmptyCart)?;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart.into());
        }

        // Reserved on a copy so a failed checkout leaves no gap in the numbering.
        let mut next_numbers = numbers.clone();
        let order_number = next_numbers.next(now)?;

        let mut products: HashMap<ProductId, Product> = HashMap::new();
        let mut items = Vec::with_capacity(cart.items().len());
        for (idx, line) in cart.items().iter().enumerate() {
            if !products.contains_key(&line.product_id) {
                let product: Product = uow.load(line.product_id.aggregate_id())?;
                products.insert(line.product_id, product);
            }
            let Some(product) = products.get_mut(&line.product_id) else {
                return Err(DomainError::not_found(format!("product {}", line.product_id)).into());
            };

            validate_add(product, line.variant_id, line.quantity, None).map_err(|err| {
                tracing::info!(product_id = %line.product_id, error = %err, "checkout stock check failed");
                DomainError::out_of_stock(format!("{} is out of stock", display_name(product)))
            })?;

            let variant = line.variant_id.and_then(|id| product.variant(id));
            let on_hand = product.effective_stock(variant);
            let backordered = product.track_inventory() && on_hand < i64::from(line.quantity);
            let product_sku = variant
                .map(|v| v.sku.clone())
                .unwrap_or_else(|| product.sku().to_string());
            let product_name = product.name().to_string();

            let sale = ProductCommand::AdjustStock(AdjustStock {
                product_id: line.product_id,
                variant_id: line.variant_id,
                movement: MovementType::Sale,
                delta: -i64::from(line.quantity),
                reference: Some(order_number.clone()),
                occurred_at: now,
            });
            uow.execute(product, &sale)?;

            items.push(OrderItem {
                line_no: u32::try_from(idx + 1)
                    .map_err(|_| DomainError::validation("too many order lines"))?,
                product_id: line.product_id,
                variant_id: line.variant_id,
                product_name,
                product_sku,
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: compute_line_total(line.unit_price, line.quantity)?,
                flash_sale: line.flash_sale,
                backordered,
            });
        }

        self.record_flash_sales(&mut uow, &items, &order_number, now)?;

        let (totals, coupon_code) = match request.coupon_code.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let (totals, code) = self.redeem_coupon(&mut uow, raw, &items, &order_number, now)?;
                (totals, Some(code))
            }
            _ => (compute_cart_totals(&items, &self.pricing)?, None),
        };

        let order_id = OrderId::generate();
        let mut order: Order = uow.load(order_id.aggregate_id())?;
        let place = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            order_number: order_number.clone(),
            placed_by: owner.clone(),
            source_cart: cart.id_typed(),
            items,
            totals,
            billing_address: request.billing_address,
            shipping_address: request.shipping_address,
            coupon_code,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            occurred_at: now,
        });
        uow.execute(&mut order, &place)?;

        let checked_out = CartCommand::DeactivateCart(DeactivateCart {
            cart_id: cart.id_typed(),
            reason: DeactivationReason::CheckedOut {
                order_number: order_number.clone(),
            },
            occurred_at: now,
        });
        uow.execute(&mut cart, &checked_out)?;

        self.commit(uow)?;
        *numbers = next_numbers;

        tracing::info!(%order_id, %order_number, total = %order.totals().total, "order placed");
        Ok(OrderDetail::from(&order))
    }

    fn record_flash_sales(
        &self,
        uow: &mut UnitOfWork<'_, dyn EventStore>,
        items: &[OrderItem],
        order_number: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut sales: HashMap<FlashSaleId, FlashSale> = HashMap::new();
        for item in items {
            let Some(sale_id) = item.flash_sale else {
                continue;
            };
            if !sales.contains_key(&sale_id) {
                let sale: FlashSale = uow.load(sale_id.aggregate_id())?;
                sales.insert(sale_id, sale);
            }
            let Some(sale) = sales.get_mut(&sale_id) else {
                continue;
            };
            let command = FlashSaleCommand::RecordSale(RecordSale {
                sale_id,
                product_id: item.product_id,
                quantity: item.quantity,
                order_number: order_number.to_string(),
                occurred_at: now,
            });
            uow.execute(sale, &command)?;
        }
        Ok(())
    }

    /// Validate and redeem `raw_code`; returns the discounted totals.
    fn redeem_coupon(
        &self,
        uow: &mut UnitOfWork<'_, dyn EventStore>,
        raw_code: &str,
        items: &[OrderItem],
        order_number: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<(CartTotals, CouponCode)> {
        let code = CouponCode::parse(raw_code)
            .map_err(|_| DomainError::invalid_coupon(format!("{raw_code} is not a valid coupon code")))?;
        let known = self
            .projections
            .coupons
            .find_by_code(&code)
            .ok_or_else(|| DomainError::invalid_coupon(format!("{code} does not exist")))?;

        let mut coupon: Coupon = uow.load(known.id_typed().aggregate_id())?;
        let undiscounted = compute_cart_totals(items, &self.pricing)?;
        coupon.check_applicable(undiscounted.subtotal, now)?;

        let totals = compute_totals(items, &self.pricing, |subtotal, shipping| {
            coupon.discount_split(subtotal, shipping)
        })?;
        let command = CouponCommand::RedeemCoupon(RedeemCoupon {
            coupon_id: coupon.id_typed(),
            order_number: order_number.to_string(),
            subtotal: totals.subtotal,
            discount: totals.discount,
            occurred_at: now,
        });
        uow.execute(&mut coupon, &command)?;
        Ok((totals, code))
    }

    /// Customer cancellation, allowed while the order is pending or confirmed.
    /// Stock is returned to the shelf.
    #[tracing::instrument(skip_all, fields(%owner, %order_id))]
    pub fn cancel_order(
        &self,
        owner: &Owner,
        order_id: OrderId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<OrderDetail> {
        let _writer = self.lock_writer()?;
        let mut uow = self.unit_of_work();
        let mut order: Order = uow.load(order_id.aggregate_id())?;
        if !order.exists() || !order.is_owned_by(owner) {
            return Err(DomainError::not_found(format!("order {order_id}")).into());
        }
        if !order.status().customer_cancellable() {
            return Err(DomainError::invariant(format!(
                "an order that is {} can no longer be cancelled",
                order.status()
            ))
            .into());
        }

        self.transition(&mut uow, &mut order, OrderStatus::Cancelled, reason, owner.user_id(), now)?;
        self.commit(uow)?;
        Ok(OrderDetail::from(&order))
    }

    /// Back-office status change. Leaving a stock-holding status (cancel,
    /// return) puts the order's units back in stock.
    #[tracing::instrument(skip_all, fields(%order_id, status = %status))]
    pub fn change_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        notes: Option<String>,
        changed_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> ServiceResult<OrderDetail> {
        let _writer = self.lock_writer()?;
        let mut uow = self.unit_of_work();
        let mut order: Order = uow.load(order_id.aggregate_id())?;
        if !order.exists() {
            return Err(DomainError::not_found(format!("order {order_id}")).into());
        }

        self.transition(&mut uow, &mut order, status, notes, changed_by, now)?;
        self.commit(uow)?;
        Ok(OrderDetail::from(&order))
    }

    fn transition(
        &self,
        uow: &mut UnitOfWork<'_, dyn EventStore>,
        order: &mut Order,
        status: OrderStatus,
        notes: Option<String>,
        changed_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let from = order.status();
        let command = OrderCommand::ChangeStatus(ChangeOrderStatus {
            order_id: order.id_typed(),
            status,
            notes,
            changed_by,
            occurred_at: now,
        });
        uow.execute(order, &command)?;

        if from.holds_stock() && !status.holds_stock() {
            self.restock(uow, order, now)?;
        }
        tracing::info!(order_number = order.order_number(), %from, to = %status, "order status changed");
        Ok(())
    }

    fn restock(
        &self,
        uow: &mut UnitOfWork<'_, dyn EventStore>,
        order: &Order,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        for item in order.items() {
            if !products.contains_key(&item.product_id) {
                let product: Product = uow.load(item.product_id.aggregate_id())?;
                products.insert(item.product_id, product);
            }
            let Some(product) = products.get_mut(&item.product_id) else {
                continue;
            };
            let command = ProductCommand::AdjustStock(AdjustStock {
                product_id: item.product_id,
                variant_id: item.variant_id,
                movement: MovementType::Return,
                delta: i64::from(item.quantity),
                reference: Some(order.order_number().to_string()),
                occurred_at: now,
            });
            uow.execute(product, &command)?;
        }
        Ok(())
    }

    pub fn record_payment(
        &self,
        order_id: OrderId,
        status: PaymentStatus,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<OrderDetail> {
        let command = OrderCommand::RecordPayment(RecordPayment {
            order_id,
            status,
            reference,
            occurred_at: now,
        });
        let order = self.execute_one::<Order>(order_id.aggregate_id(), &command)?;
        tracing::info!(order_number = order.order_number(), ?status, "payment recorded");
        Ok(OrderDetail::from(&order))
    }

    pub fn order_detail(&self, order_id: OrderId) -> ServiceResult<Option<OrderDetail>> {
        let order: Order = load_aggregate(self.store.as_ref(), order_id.aggregate_id())?;
        Ok(order.exists().then(|| OrderDetail::from(&order)))
    }

    pub fn orders_for(&self, owner: &Owner) -> Vec<OrderSummary> {
        self.projections.orders.list_for(owner)
    }

    pub fn list_orders(&self) -> Vec<OrderSummary> {
        self.projections.orders.list_all()
    }

    /// Orders placed by `owner`, looked up by number (complaints reference these).
    pub fn owned_order_by_number(&self, owner: &Owner, order_number: &str) -> Option<OrderSummary> {
        self.projections
            .orders
            .find_by_number(order_number)
            .filter(|o| &o.placed_by == owner)
    }
}

fn display_name(product: &Product) -> String {
    if product.name().is_empty() {
        format!("product {}", product.id_typed())
    } else {
        product.name().to_string()
    }
}
