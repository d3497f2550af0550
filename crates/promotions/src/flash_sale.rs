use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_catalog::ProductId;
use commerce_core::{Aggregate, AggregateRoot, DomainError, Money, RecordStatus};
use commerce_events::Event;

commerce_core::aggregate_id!(FlashSaleId);

/// One discounted product in a flash sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleItem {
    pub product_id: ProductId,
    pub original_price: Money,
    pub sale_price: Money,
    /// Sale-quantity cap. `None` means the sale is only bounded by stock.
    pub stock_limit: Option<u32>,
    pub sold_quantity: u32,
}

impl FlashSaleItem {
    pub fn remaining(&self) -> Option<u32> {
        self.stock_limit
            .map(|limit| limit.saturating_sub(self.sold_quantity))
    }
}

/// A live sale price for a product, as seen by the pricing validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOffer {
    pub sale_id: FlashSaleId,
    pub product_id: ProductId,
    pub sale_price: Money,
    pub remaining: Option<u32>,
}

impl SaleOffer {
    /// The whole requested quantity fits in the remaining allocation.
    pub fn covers(&self, quantity: u32) -> bool {
        self.remaining.is_none_or(|left| quantity <= left)
    }
}

/// Aggregate root: FlashSale (time-boxed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashSale {
    id: FlashSaleId,
    name: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    max_discount_bps: Option<u32>,
    status: RecordStatus,
    items: Vec<FlashSaleItem>,
    version: u64,
    created: bool,
}

impl FlashSale {
    pub fn empty(id: FlashSaleId) -> Self {
        Self {
            id,
            name: String::new(),
            starts_at: DateTime::<Utc>::MIN_UTC,
            ends_at: DateTime::<Utc>::MIN_UTC,
            max_discount_bps: None,
            status: RecordStatus::Active,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> FlashSaleId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    pub fn items(&self) -> &[FlashSaleItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&FlashSaleItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.created && self.status.is_visible() && self.starts_at <= now && now < self.ends_at
    }

    /// The sale price for `product_id`, if the sale is live and not sold out.
    pub fn offer_for(&self, product_id: ProductId, now: DateTime<Utc>) -> Option<SaleOffer> {
        if !self.is_live(now) {
            return None;
        }
        let item = self.item(product_id)?;
        let remaining = item.remaining();
        if remaining == Some(0) {
            return None;
        }
        Some(SaleOffer {
            sale_id: self.id,
            product_id,
            sale_price: item.sale_price,
            remaining,
        })
    }
}

impl AggregateRoot for FlashSale {
    type Id = FlashSaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFlashSale {
    pub sale_id: FlashSaleId,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_discount_bps: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSaleItem {
    pub sale_id: FlashSaleId,
    pub product_id: ProductId,
    pub original_price: Money,
    pub sale_price: Money,
    pub stock_limit: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordSale. Issued by checkout for sale-priced lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: FlashSaleId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub order_number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndFlashSale {
    pub sale_id: FlashSaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashSaleCommand {
    CreateFlashSale(CreateFlashSale),
    AddSaleItem(AddSaleItem),
    RecordSale(RecordSale),
    EndFlashSale(EndFlashSale),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleCreated {
    pub sale_id: FlashSaleId,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_discount_bps: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItemAdded {
    pub sale_id: FlashSaleId,
    pub item: FlashSaleItem,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: FlashSaleId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub sold_quantity: u32,
    pub order_number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleEnded {
    pub sale_id: FlashSaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashSaleEvent {
    FlashSaleCreated(FlashSaleCreated),
    SaleItemAdded(SaleItemAdded),
    SaleRecorded(SaleRecorded),
    FlashSaleEnded(FlashSaleEnded),
}

impl Event for FlashSaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FlashSaleEvent::FlashSaleCreated(_) => "promotions.flash_sale.created",
            FlashSaleEvent::SaleItemAdded(_) => "promotions.flash_sale.item_added",
            FlashSaleEvent::SaleRecorded(_) => "promotions.flash_sale.sale_recorded",
            FlashSaleEvent::FlashSaleEnded(_) => "promotions.flash_sale.ended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FlashSaleEvent::FlashSaleCreated(e) => e.occurred_at,
            FlashSaleEvent::SaleItemAdded(e) => e.occurred_at,
            FlashSaleEvent::SaleRecorded(e) => e.occurred_at,
            FlashSaleEvent::FlashSaleEnded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for FlashSale {
    type Command = FlashSaleCommand;
    type Event = FlashSaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FlashSaleEvent::FlashSaleCreated(e) => {
                self.id = e.sale_id;
                self.name = e.name.clone();
                self.starts_at = e.starts_at;
                self.ends_at = e.ends_at;
                self.max_discount_bps = e.max_discount_bps;
                self.status = RecordStatus::Active;
                self.items.clear();
                self.created = true;
            }
            FlashSaleEvent::SaleItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            FlashSaleEvent::SaleRecorded(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.product_id == e.product_id) {
                    item.sold_quantity = e.sold_quantity;
                }
            }
            FlashSaleEvent::FlashSaleEnded(_) => {
                self.status = RecordStatus::Inactive;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FlashSaleCommand::CreateFlashSale(cmd) => self.handle_create(cmd),
            FlashSaleCommand::AddSaleItem(cmd) => self.handle_add_item(cmd),
            FlashSaleCommand::RecordSale(cmd) => self.handle_record_sale(cmd),
            FlashSaleCommand::EndFlashSale(cmd) => self.handle_end(cmd),
        }
    }
}

impl FlashSale {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("flash sale"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateFlashSale) -> Result<Vec<FlashSaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("flash sale already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("flash sale name cannot be empty"));
        }
        if cmd.ends_at <= cmd.starts_at {
            return Err(DomainError::validation("flash sale must end after it starts"));
        }
        if cmd.max_discount_bps.is_some_and(|bps| bps == 0 || bps > 10_000) {
            return Err(DomainError::validation(
                "max discount must be between 0.01% and 100%",
            ));
        }

        Ok(vec![FlashSaleEvent::FlashSaleCreated(FlashSaleCreated {
            sale_id: cmd.sale_id,
            name: cmd.name.trim().to_string(),
            starts_at: cmd.starts_at,
            ends_at: cmd.ends_at,
            max_discount_bps: cmd.max_discount_bps,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddSaleItem) -> Result<Vec<FlashSaleEvent>, DomainError> {
        self.ensure_exists()?;
        if !self.status.is_visible() {
            return Err(DomainError::invariant("flash sale has ended"));
        }
        if self.item(cmd.product_id).is_some() {
            return Err(DomainError::conflict("product is already in this flash sale"));
        }
        if cmd.sale_price >= cmd.original_price {
            return Err(DomainError::validation(
                "sale price must be lower than the original price",
            ));
        }
        if let Some(max_bps) = self.max_discount_bps {
            let discount = cmd.original_price.saturating_sub(cmd.sale_price);
            if discount > cmd.original_price.percent_bps(max_bps) {
                return Err(DomainError::validation(format!(
                    "discount exceeds the sale maximum of {}.{:02}%",
                    max_bps / 100,
                    max_bps % 100
                )));
            }
        }
        if cmd.stock_limit == Some(0) {
            return Err(DomainError::validation("stock_limit must be at least 1"));
        }

        Ok(vec![FlashSaleEvent::SaleItemAdded(SaleItemAdded {
            sale_id: cmd.sale_id,
            item: FlashSaleItem {
                product_id: cmd.product_id,
                original_price: cmd.original_price,
                sale_price: cmd.sale_price,
                stock_limit: cmd.stock_limit,
                sold_quantity: 0,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_sale(&self, cmd: &RecordSale) -> Result<Vec<FlashSaleEvent>, DomainError> {
        self.ensure_exists()?;
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let item = self
            .item(cmd.product_id)
            .ok_or_else(|| DomainError::not_found("flash sale item"))?;

        if let Some(left) = item.remaining() {
            if cmd.quantity > left {
                return Err(DomainError::out_of_stock(format!(
                    "flash sale '{}' has only {left} left for this product",
                    self.name
                )));
            }
        }

        let sold_quantity = item
            .sold_quantity
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::validation("sold quantity overflow"))?;

        Ok(vec![FlashSaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            sold_quantity,
            order_number: cmd.order_number.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_end(&self, cmd: &EndFlashSale) -> Result<Vec<FlashSaleEvent>, DomainError> {
        self.ensure_exists()?;
        if !self.status.is_visible() {
            return Ok(vec![]);
        }
        Ok(vec![FlashSaleEvent::FlashSaleEnded(FlashSaleEnded {
            sale_id: cmd.sale_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use commerce_events::execute;

    fn live_sale(stock_limit: Option<u32>) -> (FlashSale, ProductId) {
        let id = FlashSaleId::generate();
        let product_id = ProductId::generate();
        let now = Utc::now();
        let mut sale = FlashSale::empty(id);
        execute(
            &mut sale,
            &FlashSaleCommand::CreateFlashSale(CreateFlashSale {
                sale_id: id,
                name: "Midnight madness".into(),
                starts_at: now - Duration::hours(1),
                ends_at: now + Duration::hours(1),
                max_discount_bps: Some(5000),
                occurred_at: now,
            }),
        )
        .unwrap();
        execute(
            &mut sale,
            &FlashSaleCommand::AddSaleItem(AddSaleItem {
                sale_id: id,
                product_id,
                original_price: Money::from_minor(10000),
                sale_price: Money::from_minor(7000),
                stock_limit,
                occurred_at: now,
            }),
        )
        .unwrap();
        (sale, product_id)
    }

    fn record(sale: &FlashSale, product_id: ProductId, quantity: u32) -> FlashSaleCommand {
        FlashSaleCommand::RecordSale(RecordSale {
            sale_id: sale.id_typed(),
            product_id,
            quantity,
            order_number: "ORD202610160001".into(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn live_sale_offers_sale_price_with_remaining_cap() {
        let (sale, product_id) = live_sale(Some(3));
        let offer = sale.offer_for(product_id, Utc::now()).unwrap();
        assert_eq!(offer.sale_price, Money::from_minor(7000));
        assert_eq!(offer.remaining, Some(3));
        assert!(offer.covers(3));
        assert!(!offer.covers(4));
    }

    #[test]
    fn no_offer_outside_the_window() {
        let (sale, product_id) = live_sale(None);
        assert!(sale.offer_for(product_id, Utc::now() + Duration::hours(2)).is_none());
        assert!(sale.offer_for(ProductId::generate(), Utc::now()).is_none());
    }

    #[test]
    fn recording_beyond_the_cap_is_out_of_stock() {
        let (mut sale, product_id) = live_sale(Some(3));
        let first = record(&sale, product_id, 2);
        execute(&mut sale, &first).unwrap();
        assert_eq!(sale.item(product_id).unwrap().sold_quantity, 2);

        let err = sale.handle(&record(&sale, product_id, 2)).unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock(_)));
    }

    #[test]
    fn uncapped_sold_quantity_overflow_is_rejected() {
        let (mut sale, product_id) = live_sale(None);
        let first = record(&sale, product_id, 1);
        execute(&mut sale, &first).unwrap();

        let err = sale.handle(&record(&sale, product_id, u32::MAX)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(sale.item(product_id).unwrap().sold_quantity, 1);
    }

    #[test]
    fn sold_out_item_has_no_offer() {
        let (mut sale, product_id) = live_sale(Some(1));
        let cmd = record(&sale, product_id, 1);
        execute(&mut sale, &cmd).unwrap();
        assert!(sale.offer_for(product_id, Utc::now()).is_none());
    }

    #[test]
    fn discount_above_sale_maximum_is_rejected() {
        let (sale, _) = live_sale(None);
        let err = sale
            .handle(&FlashSaleCommand::AddSaleItem(AddSaleItem {
                sale_id: sale.id_typed(),
                product_id: ProductId::generate(),
                original_price: Money::from_minor(10000),
                sale_price: Money::from_minor(4000),
                stock_limit: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn end_date_must_follow_start() {
        let id = FlashSaleId::generate();
        let now = Utc::now();
        let err = FlashSale::empty(id)
            .handle(&FlashSaleCommand::CreateFlashSale(CreateFlashSale {
                sale_id: id,
                name: "Backwards".into(),
                starts_at: now,
                ends_at: now,
                max_discount_bps: None,
                occurred_at: now,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
