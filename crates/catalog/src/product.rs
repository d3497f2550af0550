use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_core::{Aggregate, AggregateRoot, DomainError, Money};
use commerce_events::Event;

use crate::category::CategoryId;
use crate::stock::{MovementType, StockStatus};
use crate::variant::{ProductVariant, VariantId};

commerce_core::aggregate_id!(
    /// Product identifier.
    ProductId
);

/// Product status lifecycle. Only `Active` products are sellable; `Archived`
/// is the soft-deleted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

/// Aggregate root: Product (owns its variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    description: String,
    category_id: Option<CategoryId>,
    price: Money,
    stock_quantity: i64,
    low_stock_threshold: u32,
    track_inventory: bool,
    allow_backorder: bool,
    status: ProductStatus,
    variants: Vec<ProductVariant>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            sku: String::new(),
            name: String::new(),
            description: String::new(),
            category_id: None,
            price: Money::ZERO,
            stock_quantity: 0,
            low_stock_threshold: 0,
            track_inventory: true,
            allow_backorder: false,
            status: ProductStatus::Draft,
            variants: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn low_stock_threshold(&self) -> u32 {
        self.low_stock_threshold
    }

    pub fn track_inventory(&self) -> bool {
        self.track_inventory
    }

    pub fn allow_backorder(&self) -> bool {
        self.allow_backorder
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn variants(&self) -> &[ProductVariant] {
        &self.variants
    }

    pub fn variant(&self, variant_id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Check if product can be sold (must be Active, not Draft/Archived).
    pub fn can_be_sold(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }

    /// Variant price override, else the product price.
    pub fn effective_price(&self, variant: Option<&ProductVariant>) -> Money {
        variant.and_then(|v| v.price).unwrap_or(self.price)
    }

    /// Variant stock override, else the product stock.
    pub fn effective_stock(&self, variant: Option<&ProductVariant>) -> i64 {
        variant
            .and_then(|v| v.stock_quantity)
            .unwrap_or(self.stock_quantity)
    }

    pub fn stock_status(&self, variant: Option<&ProductVariant>) -> StockStatus {
        StockStatus::classify(
            self.effective_stock(variant),
            self.low_stock_threshold,
            self.track_inventory,
            self.allow_backorder,
        )
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    pub initial_stock: u32,
    pub low_stock_threshold: u32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProductDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductDetails {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub low_stock_threshold: u32,
    pub allow_backorder: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePrice. Existing cart lines keep their snapshot price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePrice {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddVariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddVariant {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub sku: String,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
///
/// Targets the variant's own stock when the variant overrides it, otherwise
/// the product stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub movement: MovementType,
    pub delta: i64,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProductDetails(UpdateProductDetails),
    ChangePrice(ChangePrice),
    AddVariant(AddVariant),
    ActivateProduct(ActivateProduct),
    ArchiveProduct(ArchiveProduct),
    AdjustStock(AdjustStock),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub price: Money,
    pub stock_quantity: i64,
    pub low_stock_threshold: u32,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetailsUpdated {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub low_stock_threshold: u32,
    pub allow_backorder: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub previous_price: Money,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAdded {
    pub product_id: ProductId,
    pub variant: ProductVariant,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted. This is the stock movement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub movement: MovementType,
    pub delta: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductDetailsUpdated(ProductDetailsUpdated),
    PriceChanged(PriceChanged),
    VariantAdded(VariantAdded),
    ProductActivated(ProductActivated),
    ProductArchived(ProductArchived),
    StockAdjusted(StockAdjusted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductDetailsUpdated(_) => "catalog.product.details_updated",
            ProductEvent::PriceChanged(_) => "catalog.product.price_changed",
            ProductEvent::VariantAdded(_) => "catalog.product.variant_added",
            ProductEvent::ProductActivated(_) => "catalog.product.activated",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
            ProductEvent::StockAdjusted(_) => "catalog.product.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductDetailsUpdated(e) => e.occurred_at,
            ProductEvent::PriceChanged(e) => e.occurred_at,
            ProductEvent::VariantAdded(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.category_id = e.category_id;
                self.price = e.price;
                self.stock_quantity = e.stock_quantity;
                self.low_stock_threshold = e.low_stock_threshold;
                self.track_inventory = e.track_inventory;
                self.allow_backorder = e.allow_backorder;
                self.status = ProductStatus::Draft;
                self.variants.clear();
                self.created = true;
            }
            ProductEvent::ProductDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.low_stock_threshold = e.low_stock_threshold;
                self.allow_backorder = e.allow_backorder;
            }
            ProductEvent::PriceChanged(e) => match e.variant_id {
                Some(variant_id) => {
                    if let Some(v) = self.variants.iter_mut().find(|v| v.id == variant_id) {
                        v.price = Some(e.price);
                    }
                }
                None => self.price = e.price,
            },
            ProductEvent::VariantAdded(e) => {
                self.variants.push(e.variant.clone());
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
            ProductEvent::StockAdjusted(e) => {
                let variant = e
                    .variant_id
                    .and_then(|id| self.variants.iter_mut().find(|v| v.id == id))
                    .filter(|v| v.stock_quantity.is_some());
                match variant {
                    Some(v) => v.stock_quantity = Some(e.new_stock),
                    None => self.stock_quantity = e.new_stock,
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProductDetails(cmd) => self.handle_update_details(cmd),
            ProductCommand::ChangePrice(cmd) => self.handle_change_price(cmd),
            ProductCommand::AddVariant(cmd) => self.handle_add_variant(cmd),
            ProductCommand::ActivateProduct(cmd) => self.handle_activate(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust_stock(cmd),
        }
    }
}

impl Product {
    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("product"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            category_id: cmd.category_id,
            price: cmd.price,
            stock_quantity: i64::from(cmd.initial_stock),
            low_stock_threshold: cmd.low_stock_threshold,
            track_inventory: cmd.track_inventory,
            allow_backorder: cmd.allow_backorder,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(
        &self,
        cmd: &UpdateProductDetails,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        let negative = self.stock_quantity < 0
            || self
                .variants
                .iter()
                .any(|v| v.stock_quantity.is_some_and(|q| q < 0));
        if !cmd.allow_backorder && negative {
            return Err(DomainError::invariant(
                "cannot disable backorders while stock is negative",
            ));
        }

        Ok(vec![ProductEvent::ProductDetailsUpdated(ProductDetailsUpdated {
            product_id: cmd.product_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            low_stock_threshold: cmd.low_stock_threshold,
            allow_backorder: cmd.allow_backorder,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangePrice) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("cannot reprice an archived product"));
        }

        let previous_price = match cmd.variant_id {
            Some(id) => {
                let variant = self.variant(id).ok_or_else(|| DomainError::not_found("variant"))?;
                self.effective_price(Some(variant))
            }
            None => self.price,
        };
        if previous_price == cmd.price {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::PriceChanged(PriceChanged {
            product_id: cmd.product_id,
            variant_id: cmd.variant_id,
            previous_price,
            price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_variant(&self, cmd: &AddVariant) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("cannot add variants to an archived product"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("variant sku cannot be empty"));
        }
        if self.variant(cmd.variant_id).is_some() {
            return Err(DomainError::conflict("variant already exists"));
        }
        if self.variants.iter().any(|v| v.sku == cmd.sku.trim()) || self.sku == cmd.sku.trim() {
            return Err(DomainError::conflict(format!("sku {} already in use", cmd.sku.trim())));
        }

        Ok(vec![ProductEvent::VariantAdded(VariantAdded {
            product_id: cmd.product_id,
            variant: ProductVariant {
                id: cmd.variant_id,
                sku: cmd.sku.trim().to_string(),
                name: cmd.name.trim().to_string(),
                attributes: cmd.attributes.clone(),
                price: cmd.price,
                stock_quantity: cmd.stock_quantity.map(i64::from),
                active: true,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        match self.status {
            ProductStatus::Active => Err(DomainError::conflict("product is already active")),
            ProductStatus::Archived => {
                Err(DomainError::invariant("cannot activate an archived product"))
            }
            ProductStatus::Draft => Ok(vec![ProductEvent::ProductActivated(ProductActivated {
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        if !cmd.movement.accepts(cmd.delta) {
            return Err(DomainError::validation(format!(
                "delta {} is not valid for a {} movement",
                cmd.delta,
                cmd.movement.as_str()
            )));
        }

        let variant = match cmd.variant_id {
            Some(id) => Some(self.variant(id).ok_or_else(|| DomainError::not_found("variant"))?),
            None => None,
        };
        let previous_stock = self.effective_stock(variant);
        let new_stock = previous_stock
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::validation("stock overflow"))?;

        if new_stock < 0 && self.track_inventory && !self.allow_backorder {
            return Err(DomainError::out_of_stock(format!(
                "{} has {} in stock, cannot remove {}",
                self.name,
                previous_stock.max(0),
                -cmd.delta
            )));
        }

        // Only keep the variant id when the variant carries its own stock.
        let variant_id = variant
            .filter(|v| v.stock_quantity.is_some())
            .map(|v| v.id);

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            variant_id,
            movement: cmd.movement,
            delta: cmd.delta,
            previous_stock,
            new_stock,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_events::execute;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(id: ProductId, stock: u32, backorder: bool) -> CreateProduct {
        CreateProduct {
            product_id: id,
            sku: "TSHIRT-001".into(),
            name: "Cotton T-Shirt".into(),
            description: String::new(),
            category_id: None,
            price: Money::from_minor(2500),
            initial_stock: stock,
            low_stock_threshold: 2,
            track_inventory: true,
            allow_backorder: backorder,
            occurred_at: now(),
        }
    }

    fn active_product(stock: u32, backorder: bool) -> Product {
        let id = ProductId::generate();
        let mut p = Product::empty(id);
        execute(&mut p, &ProductCommand::CreateProduct(create_cmd(id, stock, backorder))).unwrap();
        execute(
            &mut p,
            &ProductCommand::ActivateProduct(ActivateProduct {
                product_id: id,
                occurred_at: now(),
            }),
        )
        .unwrap();
        p
    }

    fn add_variant(p: &mut Product, price: Option<u64>, stock: Option<u32>) -> VariantId {
        let variant_id = VariantId::generate();
        let cmd = ProductCommand::AddVariant(AddVariant {
            product_id: p.id_typed(),
            variant_id,
            sku: format!("TSHIRT-001-{}", p.variants().len() + 1),
            name: "Large".into(),
            attributes: BTreeMap::from([("size".to_string(), "L".to_string())]),
            price: price.map(Money::from_minor),
            stock_quantity: stock,
            occurred_at: now(),
        });
        execute(p, &cmd).unwrap();
        variant_id
    }

    fn adjust(p: &Product, variant_id: Option<VariantId>, movement: MovementType, delta: i64) -> ProductCommand {
        ProductCommand::AdjustStock(AdjustStock {
            product_id: p.id_typed(),
            variant_id,
            movement,
            delta,
            reference: None,
            occurred_at: now(),
        })
    }

    #[test]
    fn create_product_emits_created_event_in_draft() {
        let id = ProductId::generate();
        let mut p = Product::empty(id);
        let events = execute(&mut p, &ProductCommand::CreateProduct(create_cmd(id, 5, false))).unwrap();

        match &events[0] {
            ProductEvent::ProductCreated(e) => {
                assert_eq!(e.stock_quantity, 5);
                assert_eq!(e.price, Money::from_minor(2500));
            }
            _ => panic!("Expected ProductCreated event"),
        }
        assert_eq!(p.status(), ProductStatus::Draft);
        assert!(!p.can_be_sold());
        assert_eq!(p.version(), 1);
    }

    #[test]
    fn create_rejects_blank_sku_and_duplicates() {
        let id = ProductId::generate();
        let mut cmd = create_cmd(id, 1, false);
        cmd.sku = "  ".into();
        assert!(matches!(
            Product::empty(id).handle(&ProductCommand::CreateProduct(cmd)),
            Err(DomainError::Validation(_))
        ));

        let p = active_product(1, false);
        let again = create_cmd(p.id_typed(), 1, false);
        assert!(matches!(
            p.handle(&ProductCommand::CreateProduct(again)),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn variant_overrides_price_and_stock() {
        let mut p = active_product(10, false);
        let priced = add_variant(&mut p, Some(3000), Some(4));
        let plain = add_variant(&mut p, None, None);

        let priced = p.variant(priced).unwrap();
        let plain = p.variant(plain).unwrap();
        assert_eq!(p.effective_price(Some(priced)), Money::from_minor(3000));
        assert_eq!(p.effective_stock(Some(priced)), 4);
        assert_eq!(p.effective_price(Some(plain)), Money::from_minor(2500));
        assert_eq!(p.effective_stock(Some(plain)), 10);
    }

    #[test]
    fn sale_cannot_drive_stock_negative_without_backorder() {
        let p = active_product(5, false);
        let err = p.handle(&adjust(&p, None, MovementType::Sale, -6)).unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock(_)));
    }

    #[test]
    fn backorder_products_may_go_negative() {
        let mut p = active_product(1, true);
        let cmd = adjust(&p, None, MovementType::Sale, -3);
        let events = execute(&mut p, &cmd).unwrap();

        match &events[0] {
            ProductEvent::StockAdjusted(e) => {
                assert_eq!(e.previous_stock, 1);
                assert_eq!(e.new_stock, -2);
            }
            _ => panic!("Expected StockAdjusted event"),
        }
        assert_eq!(p.stock_status(None), StockStatus::Backorder);
    }

    #[test]
    fn variant_with_own_stock_is_adjusted_independently() {
        let mut p = active_product(10, false);
        let v = add_variant(&mut p, None, Some(3));
        let cmd = adjust(&p, Some(v), MovementType::Sale, -2);
        execute(&mut p, &cmd).unwrap();

        assert_eq!(p.effective_stock(p.variant(v)), 1);
        assert_eq!(p.stock_quantity(), 10);
    }

    #[test]
    fn movement_sign_is_validated() {
        let p = active_product(5, false);
        assert!(matches!(
            p.handle(&adjust(&p, None, MovementType::Purchase, -1)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn archived_products_cannot_be_sold_or_reactivated() {
        let mut p = active_product(5, false);
        let product_id = p.id_typed();
        execute(
            &mut p,
            &ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id,
                occurred_at: now(),
            }),
        )
        .unwrap();

        assert!(!p.can_be_sold());
        let err = p
            .handle(&ProductCommand::ActivateProduct(ActivateProduct {
                product_id: p.id_typed(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn unchanged_price_emits_nothing() {
        let p = active_product(5, false);
        let events = p
            .handle(&ProductCommand::ChangePrice(ChangePrice {
                product_id: p.id_typed(),
                variant_id: None,
                price: Money::from_minor(2500),
                occurred_at: now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn disabling_backorder_with_negative_stock_is_rejected() {
        let mut p = active_product(0, true);
        let cmd = adjust(&p, None, MovementType::Sale, -1);
        execute(&mut p, &cmd).unwrap();

        let err = p
            .handle(&ProductCommand::UpdateProductDetails(UpdateProductDetails {
                product_id: p.id_typed(),
                name: "Cotton T-Shirt".into(),
                description: String::new(),
                low_stock_threshold: 2,
                allow_backorder: false,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn stock_never_negative_without_backorder(
                initial in 0u32..50,
                sales in proptest::collection::vec(1i64..10, 0..20),
            ) {
                let mut p = active_product(initial, false);
                for qty in sales {
                    let cmd = adjust(&p, None, MovementType::Sale, -qty);
                    let _ = execute(&mut p, &cmd);
                    prop_assert!(p.stock_quantity() >= 0);
                }
            }

            #[test]
            fn version_counts_applied_events(adjustments in proptest::collection::vec(1i64..5, 0..10)) {
                let mut p = active_product(0, false);
                let base = p.version();
                for qty in &adjustments {
                    let cmd = adjust(&p, None, MovementType::Purchase, *qty);
                    execute(&mut p, &cmd).unwrap();
                }
                prop_assert_eq!(p.version(), base + adjustments.len() as u64);
            }
        }
    }
}
