use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use commerce_catalog::{
    CategoryEvent, CategoryId, ProductEvent, ProductId, ProductStatus, ProductVariant,
    StockStatus,
};
use commerce_core::{Money, RecordStatus};
use commerce_events::EventEnvelope;

use crate::aggregates::StreamedAggregate;
use crate::projections::ProjectionError;
use crate::projections::cursor::StreamCursors;
use crate::read_model::KeyedStore;

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
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
    pub status: ProductStatus,
    pub stock_status: StockStatus,
    pub variants: Vec<ProductVariant>,
    pub updated_at: DateTime<Utc>,
}

impl ProductReadModel {
    fn refresh_stock_status(&mut self) {
        self.stock_status = StockStatus::classify(
            self.stock_quantity,
            self.low_stock_threshold,
            self.track_inventory,
            self.allow_backorder,
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReadModel {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub status: RecordStatus,
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: KeyedStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: KeyedStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    /// Storefront listing: `active` products only, by name.
    pub fn list_active(&self) -> Vec<ProductReadModel> {
        let mut items: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.status == ProductStatus::Active)
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    /// Admin listing, archived and draft products included.
    pub fn list_all(&self) -> Vec<ProductReadModel> {
        let mut items = self.store.list();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    pub fn find_by_sku(&self, sku: &str) -> Option<ProductReadModel> {
        self.store
            .list()
            .into_iter()
            .find(|p| p.sku.eq_ignore_ascii_case(sku))
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != commerce_catalog::Product::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let at = envelope.occurred_at();

        match ev {
            ProductEvent::ProductCreated(e) => {
                let mut rm = ProductReadModel {
                    product_id: e.product_id,
                    sku: e.sku,
                    name: e.name,
                    description: e.description,
                    category_id: e.category_id,
                    price: e.price,
                    stock_quantity: e.stock_quantity,
                    low_stock_threshold: e.low_stock_threshold,
                    track_inventory: e.track_inventory,
                    allow_backorder: e.allow_backorder,
                    status: ProductStatus::Draft,
                    stock_status: StockStatus::InStock,
                    variants: Vec::new(),
                    updated_at: at,
                };
                rm.refresh_stock_status();
                self.store.upsert(e.product_id, rm);
            }
            ProductEvent::ProductDetailsUpdated(e) => self.update(e.product_id, at, |rm| {
                rm.name = e.name;
                rm.description = e.description;
                rm.low_stock_threshold = e.low_stock_threshold;
                rm.allow_backorder = e.allow_backorder;
            })?,
            ProductEvent::PriceChanged(e) => self.update(e.product_id, at, |rm| match e.variant_id {
                Some(variant_id) => {
                    if let Some(v) = rm.variants.iter_mut().find(|v| v.id == variant_id) {
                        v.price = Some(e.price);
                    }
                }
                None => rm.price = e.price,
            })?,
            ProductEvent::VariantAdded(e) => {
                self.update(e.product_id, at, |rm| rm.variants.push(e.variant))?
            }
            ProductEvent::ProductActivated(e) => {
                self.update(e.product_id, at, |rm| rm.status = ProductStatus::Active)?
            }
            ProductEvent::ProductArchived(e) => {
                self.update(e.product_id, at, |rm| rm.status = ProductStatus::Archived)?
            }
            ProductEvent::StockAdjusted(e) => self.update(e.product_id, at, |rm| {
                let variant = e
                    .variant_id
                    .and_then(|id| rm.variants.iter_mut().find(|v| v.id == id));
                match variant {
                    Some(v) => v.stock_quantity = Some(e.new_stock),
                    None => rm.stock_quantity = e.new_stock,
                }
            })?,
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn update(
        &self,
        product_id: ProductId,
        at: DateTime<Utc>,
        change: impl FnOnce(&mut ProductReadModel),
    ) -> Result<(), ProjectionError> {
        let mut rm = self
            .store
            .get(&product_id)
            .ok_or_else(|| ProjectionError::MissingRecord(format!("product {product_id}")))?;
        change(&mut rm);
        rm.refresh_stock_status();
        rm.updated_at = at;
        self.store.upsert(product_id, rm);
        Ok(())
    }

    pub fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

#[derive(Debug)]
pub struct CategoryProjection<S>
where
    S: KeyedStore<CategoryId, CategoryReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> CategoryProjection<S>
where
    S: KeyedStore<CategoryId, CategoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, category_id: &CategoryId) -> Option<CategoryReadModel> {
        self.store.get(category_id)
    }

    pub fn list_active(&self) -> Vec<CategoryReadModel> {
        let mut items: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|c| c.status.is_visible())
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<CategoryReadModel> {
        self.store.list().into_iter().find(|c| c.slug == slug)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != commerce_catalog::Category::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: CategoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            CategoryEvent::CategoryCreated(e) => self.store.upsert(
                e.category_id,
                CategoryReadModel {
                    category_id: e.category_id,
                    name: e.name,
                    slug: e.slug,
                    parent_id: e.parent_id,
                    status: RecordStatus::Active,
                },
            ),
            CategoryEvent::CategoryDeactivated(e) => {
                let mut rm = self.store.get(&e.category_id).ok_or_else(|| {
                    ProjectionError::MissingRecord(format!("category {}", e.category_id))
                })?;
                rm.status = RecordStatus::Inactive;
                self.store.upsert(e.category_id, rm);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
