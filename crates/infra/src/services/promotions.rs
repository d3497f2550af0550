use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_catalog::ProductId;
use commerce_core::{DomainError, Money, RecordStatus};
use commerce_promotions::{
    AddSaleItem, Coupon, CouponCode, CouponCommand, CouponId, CreateCoupon, CreateFlashSale,
    DeactivateCoupon, DiscountRule, EndFlashSale, FlashSale, FlashSaleCommand, FlashSaleId,
    FlashSaleItem,
};

use super::{CommerceServices, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub name: String,
    pub rule: DiscountRule,
    #[serde(default)]
    pub minimum_amount: Money,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponView {
    pub coupon_id: CouponId,
    pub code: Option<CouponCode>,
    pub name: String,
    pub rule: DiscountRule,
    pub minimum_amount: Money,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: RecordStatus,
}

impl From<&Coupon> for CouponView {
    fn from(coupon: &Coupon) -> Self {
        Self {
            coupon_id: coupon.id_typed(),
            code: coupon.code().cloned(),
            name: coupon.name().to_string(),
            rule: coupon.rule(),
            minimum_amount: coupon.minimum_amount(),
            usage_limit: coupon.usage_limit(),
            used_count: coupon.used_count(),
            valid_until: coupon.valid_until(),
            status: coupon.status(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFlashSale {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub max_discount_bps: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSaleItem {
    pub product_id: ProductId,
    pub sale_price: Money,
    #[serde(default)]
    pub stock_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashSaleView {
    pub sale_id: FlashSaleId,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub items: Vec<FlashSaleItem>,
}

impl From<&FlashSale> for FlashSaleView {
    fn from(sale: &FlashSale) -> Self {
        Self {
            sale_id: sale.id_typed(),
            name: sale.name().to_string(),
            starts_at: sale.starts_at(),
            ends_at: sale.ends_at(),
            status: sale.status(),
            items: sale.items().to_vec(),
        }
    }
}

impl CommerceServices {
    #[tracing::instrument(skip_all, fields(code = %input.code))]
    pub fn create_coupon(&self, input: NewCoupon, now: DateTime<Utc>) -> ServiceResult<CouponView> {
        let code = CouponCode::parse(&input.code)?;
        let _writer = self.lock_writer()?;
        if self.projections.coupons.find_by_code(&code).is_some() {
            return Err(DomainError::conflict(format!("coupon {code} already exists")).into());
        }

        let coupon_id = CouponId::generate();
        let command = CouponCommand::CreateCoupon(CreateCoupon {
            coupon_id,
            code,
            name: input.name,
            rule: input.rule,
            minimum_amount: input.minimum_amount,
            usage_limit: input.usage_limit,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            occurred_at: now,
        });
        let coupon = self.execute_one_locked::<Coupon>(coupon_id.aggregate_id(), &command)?;
        tracing::info!(%coupon_id, "coupon created");
        Ok(CouponView::from(&coupon))
    }

    pub fn deactivate_coupon(&self, coupon_id: CouponId, now: DateTime<Utc>) -> ServiceResult<CouponView> {
        let command = CouponCommand::DeactivateCoupon(DeactivateCoupon {
            coupon_id,
            occurred_at: now,
        });
        let coupon = self.execute_one::<Coupon>(coupon_id.aggregate_id(), &command)?;
        Ok(CouponView::from(&coupon))
    }

    pub fn list_coupons(&self) -> Vec<CouponView> {
        self.projections
            .coupons
            .list()
            .iter()
            .map(CouponView::from)
            .collect()
    }

    #[tracing::instrument(skip_all, fields(name = %input.name))]
    pub fn create_flash_sale(&self, input: NewFlashSale, now: DateTime<Utc>) -> ServiceResult<FlashSaleView> {
        let sale_id = FlashSaleId::generate();
        let command = FlashSaleCommand::CreateFlashSale(CreateFlashSale {
            sale_id,
            name: input.name,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            max_discount_bps: input.max_discount_bps,
            occurred_at: now,
        });
        let sale = self.execute_one::<FlashSale>(sale_id.aggregate_id(), &command)?;
        tracing::info!(%sale_id, "flash sale created");
        Ok(FlashSaleView::from(&sale))
    }

    /// The original price is snapshotted from the product's current price.
    pub fn add_flash_sale_item(
        &self,
        sale_id: FlashSaleId,
        input: NewSaleItem,
        now: DateTime<Utc>,
    ) -> ServiceResult<FlashSaleView> {
        let product = self
            .projections
            .products
            .get(&input.product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {}", input.product_id)))?;

        let command = FlashSaleCommand::AddSaleItem(AddSaleItem {
            sale_id,
            product_id: input.product_id,
            original_price: product.price,
            sale_price: input.sale_price,
            stock_limit: input.stock_limit,
            occurred_at: now,
        });
        let sale = self.execute_one::<FlashSale>(sale_id.aggregate_id(), &command)?;
        Ok(FlashSaleView::from(&sale))
    }

    pub fn end_flash_sale(&self, sale_id: FlashSaleId, now: DateTime<Utc>) -> ServiceResult<FlashSaleView> {
        let command = FlashSaleCommand::EndFlashSale(EndFlashSale {
            sale_id,
            occurred_at: now,
        });
        let sale = self.execute_one::<FlashSale>(sale_id.aggregate_id(), &command)?;
        tracing::info!(%sale_id, "flash sale ended");
        Ok(FlashSaleView::from(&sale))
    }

    pub fn flash_sale(&self, sale_id: FlashSaleId) -> Option<FlashSaleView> {
        self.projections
            .flash_sales
            .get(sale_id)
            .map(|s| FlashSaleView::from(&s))
    }

    pub fn live_flash_sales(&self, now: DateTime<Utc>) -> Vec<FlashSaleView> {
        self.projections
            .flash_sales
            .live(now)
            .iter()
            .map(FlashSaleView::from)
            .collect()
    }
}
