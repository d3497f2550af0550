use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use commerce_catalog::ProductId;
use commerce_events::EventEnvelope;
use commerce_promotions::{Coupon, CouponCode, CouponId, FlashSale, FlashSaleId, SaleOffer};

use crate::projections::ProjectionError;
use crate::projections::mirror::AggregateMirror;

#[derive(Debug, Default)]
pub struct CouponProjection {
    coupons: AggregateMirror<Coupon>,
}

impl CouponProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coupon_id: CouponId) -> Option<Coupon> {
        self.coupons.get(coupon_id.aggregate_id())
    }

    /// Codes are stored upper-cased, so a parsed code compares directly.
    pub fn find_by_code(&self, code: &CouponCode) -> Option<Coupon> {
        self.coupons
            .list()
            .into_iter()
            .find(|c| c.code() == Some(code))
    }

    pub fn list(&self) -> Vec<Coupon> {
        let mut coupons = self.coupons.list();
        coupons.sort_by(|a, b| {
            a.code()
                .map(CouponCode::as_str)
                .cmp(&b.code().map(CouponCode::as_str))
        });
        coupons
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.coupons.apply_envelope(envelope)
    }

    pub fn reset(&self) {
        self.coupons.reset();
    }
}

#[derive(Debug, Default)]
pub struct FlashSaleProjection {
    sales: AggregateMirror<FlashSale>,
}

impl FlashSaleProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sale_id: FlashSaleId) -> Option<FlashSale> {
        self.sales.get(sale_id.aggregate_id())
    }

    pub fn live(&self, now: DateTime<Utc>) -> Vec<FlashSale> {
        let mut sales: Vec<_> = self
            .sales
            .list()
            .into_iter()
            .filter(|s| s.is_live(now))
            .collect();
        sales.sort_by_key(|s| s.ends_at());
        sales
    }

    /// Cheapest live offer for a product when several sales overlap.
    pub fn live_offer(&self, product_id: ProductId, now: DateTime<Utc>) -> Option<SaleOffer> {
        self.sales
            .list()
            .iter()
            .filter_map(|s| s.offer_for(product_id, now))
            .min_by_key(|o| o.sale_price)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.sales.apply_envelope(envelope)
    }

    pub fn reset(&self) {
        self.sales.reset();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use commerce_core::Money;
    use commerce_events::Event;
    use commerce_promotions::{AddSaleItem, CreateFlashSale, FlashSaleCommand, FlashSaleEvent};

    use super::*;
    use crate::aggregates::StreamedAggregate;

    fn sale_events(
        sale_id: FlashSaleId,
        product_id: ProductId,
        price: u64,
        now: DateTime<Utc>,
    ) -> Vec<FlashSaleEvent> {
        let mut sale = FlashSale::empty(sale_id);
        let mut out = Vec::new();
        let commands = [
            FlashSaleCommand::CreateFlashSale(CreateFlashSale {
                sale_id,
                name: "Weekend".into(),
                starts_at: now - Duration::hours(1),
                ends_at: now + Duration::hours(1),
                max_discount_bps: None,
                occurred_at: now,
            }),
            FlashSaleCommand::AddSaleItem(AddSaleItem {
                sale_id,
                product_id,
                original_price: Money::from_minor(10_000),
                sale_price: Money::from_minor(price),
                stock_limit: None,
                occurred_at: now,
            }),
        ];
        for cmd in &commands {
            let events = commerce_events::execute(&mut sale, cmd).unwrap();
            out.extend(events);
        }
        out
    }

    fn feed(projection: &FlashSaleProjection, sale_id: FlashSaleId, events: &[FlashSaleEvent]) {
        for (i, ev) in events.iter().enumerate() {
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                sale_id.aggregate_id(),
                FlashSale::AGGREGATE_TYPE,
                i as u64 + 1,
                ev.event_type(),
                ev.occurred_at(),
                serde_json::to_value(ev).unwrap(),
            );
            projection.apply_envelope(&envelope).unwrap();
        }
    }

    #[test]
    fn overlapping_sales_quote_the_lowest_price() {
        let now = Utc::now();
        let product_id = ProductId::generate();
        let projection = FlashSaleProjection::new();

        let a = FlashSaleId::generate();
        let b = FlashSaleId::generate();
        feed(&projection, a, &sale_events(a, product_id, 8_000, now));
        feed(&projection, b, &sale_events(b, product_id, 7_500, now));

        let offer = projection.live_offer(product_id, now).unwrap();
        assert_eq!(offer.sale_id, b);
        assert_eq!(offer.sale_price, Money::from_minor(7_500));
        assert!(projection.live_offer(product_id, now + Duration::hours(2)).is_none());
    }
}
