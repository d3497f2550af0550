use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use commerce_catalog::{
    ActivateProduct, AddVariant, AdjustStock, ArchiveProduct, Category, CategoryCommand,
    CategoryId, ChangePrice, CreateCategory, CreateProduct, DeactivateCategory, MovementType,
    Product, ProductCommand, ProductId, UpdateProductDetails, VariantId,
};
use commerce_core::{DomainError, Money};

use super::{CommerceServices, ServiceResult};
use crate::projections::{CategoryReadModel, ProductReadModel};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub price: Money,
    #[serde(default)]
    pub initial_stock: u32,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
    #[serde(default)]
    pub allow_backorder: bool,
}

fn default_low_stock_threshold() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub low_stock_threshold: u32,
    #[serde(default)]
    pub allow_backorder: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub movement: MovementType,
    pub delta: i64,
    #[serde(default)]
    pub reference: Option<String>,
}

impl CommerceServices {
    #[tracing::instrument(skip_all, fields(slug = %input.slug))]
    pub fn create_category(
        &self,
        input: NewCategory,
        now: DateTime<Utc>,
    ) -> ServiceResult<CategoryReadModel> {
        let _writer = self.lock_writer()?;
        if self.projections.categories.find_by_slug(&input.slug).is_some() {
            return Err(DomainError::conflict(format!("category slug {} already exists", input.slug)).into());
        }
        if let Some(parent_id) = input.parent_id {
            self.active_category(parent_id)?;
        }

        let category_id = CategoryId::generate();
        let command = CategoryCommand::CreateCategory(CreateCategory {
            category_id,
            name: input.name,
            slug: input.slug,
            parent_id: input.parent_id,
            occurred_at: now,
        });
        self.execute_one_locked::<Category>(category_id.aggregate_id(), &command)?;
        tracing::info!(%category_id, "category created");
        self.category(category_id)
    }

    pub fn deactivate_category(&self, category_id: CategoryId, now: DateTime<Utc>) -> ServiceResult<()> {
        let command = CategoryCommand::DeactivateCategory(DeactivateCategory {
            category_id,
            occurred_at: now,
        });
        self.execute_one::<Category>(category_id.aggregate_id(), &command)?;
        Ok(())
    }

    pub fn list_categories(&self) -> Vec<CategoryReadModel> {
        self.projections.categories.list_active()
    }

    fn category(&self, category_id: CategoryId) -> ServiceResult<CategoryReadModel> {
        self.projections
            .categories
            .get(&category_id)
            .ok_or_else(|| DomainError::not_found(format!("category {category_id}")).into())
    }

    fn active_category(&self, category_id: CategoryId) -> ServiceResult<CategoryReadModel> {
        let category = self.category(category_id)?;
        if !category.status.is_visible() {
            return Err(DomainError::invariant(format!("category {category_id} is inactive")).into());
        }
        Ok(category)
    }

    /// New products start as drafts; activate them to sell.
    #[tracing::instrument(skip_all, fields(sku = %input.sku))]
    pub fn create_product(&self, input: NewProduct, now: DateTime<Utc>) -> ServiceResult<ProductReadModel> {
        let _writer = self.lock_writer()?;
        if self.projections.products.find_by_sku(input.sku.trim()).is_some() {
            return Err(DomainError::conflict(format!("sku {} already exists", input.sku.trim())).into());
        }
        if let Some(category_id) = input.category_id {
            self.active_category(category_id)?;
        }

        let product_id = ProductId::generate();
        let command = ProductCommand::CreateProduct(CreateProduct {
            product_id,
            sku: input.sku,
            name: input.name,
            description: input.description,
            category_id: input.category_id,
            price: input.price,
            initial_stock: input.initial_stock,
            low_stock_threshold: input.low_stock_threshold,
            track_inventory: input.track_inventory,
            allow_backorder: input.allow_backorder,
            occurred_at: now,
        });
        self.execute_one_locked::<Product>(product_id.aggregate_id(), &command)?;
        tracing::info!(%product_id, "product created");
        self.product_or_not_found(product_id)
    }

    pub fn update_product_details(
        &self,
        product_id: ProductId,
        details: ProductDetails,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProductReadModel> {
        let command = ProductCommand::UpdateProductDetails(UpdateProductDetails {
            product_id,
            name: details.name,
            description: details.description,
            low_stock_threshold: details.low_stock_threshold,
            allow_backorder: details.allow_backorder,
            occurred_at: now,
        });
        self.execute_one::<Product>(product_id.aggregate_id(), &command)?;
        self.product_or_not_found(product_id)
    }

    /// Lines already in carts keep the price they were added at.
    pub fn change_price(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        price: Money,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProductReadModel> {
        let command = ProductCommand::ChangePrice(ChangePrice {
            product_id,
            variant_id,
            price,
            occurred_at: now,
        });
        self.execute_one::<Product>(product_id.aggregate_id(), &command)?;
        self.product_or_not_found(product_id)
    }

    pub fn add_variant(
        &self,
        product_id: ProductId,
        input: NewVariant,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProductReadModel> {
        let command = ProductCommand::AddVariant(AddVariant {
            product_id,
            variant_id: VariantId::generate(),
            sku: input.sku,
            name: input.name,
            attributes: input.attributes,
            price: input.price,
            stock_quantity: input.stock_quantity,
            occurred_at: now,
        });
        self.execute_one::<Product>(product_id.aggregate_id(), &command)?;
        self.product_or_not_found(product_id)
    }

    pub fn activate_product(&self, product_id: ProductId, now: DateTime<Utc>) -> ServiceResult<ProductReadModel> {
        let command = ProductCommand::ActivateProduct(ActivateProduct {
            product_id,
            occurred_at: now,
        });
        self.execute_one::<Product>(product_id.aggregate_id(), &command)?;
        self.product_or_not_found(product_id)
    }

    /// Soft delete: the product stays readable by admins and past orders.
    pub fn archive_product(&self, product_id: ProductId, now: DateTime<Utc>) -> ServiceResult<ProductReadModel> {
        let command = ProductCommand::ArchiveProduct(ArchiveProduct {
            product_id,
            occurred_at: now,
        });
        self.execute_one::<Product>(product_id.aggregate_id(), &command)?;
        self.product_or_not_found(product_id)
    }

    #[tracing::instrument(skip_all, fields(%product_id, movement = adjustment.movement.as_str(), delta = adjustment.delta))]
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        adjustment: StockAdjustment,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProductReadModel> {
        let command = ProductCommand::AdjustStock(AdjustStock {
            product_id,
            variant_id: adjustment.variant_id,
            movement: adjustment.movement,
            delta: adjustment.delta,
            reference: adjustment.reference,
            occurred_at: now,
        });
        self.execute_one::<Product>(product_id.aggregate_id(), &command)?;
        self.product_or_not_found(product_id)
    }

    pub fn product(&self, product_id: ProductId) -> Option<ProductReadModel> {
        self.projections.products.get(&product_id)
    }

    /// Storefront view hides drafts and archived products.
    pub fn visible_product(&self, product_id: ProductId) -> Option<ProductReadModel> {
        self.product(product_id)
            .filter(|p| p.status == commerce_catalog::ProductStatus::Active)
    }

    pub fn list_products(&self, include_inactive: bool) -> Vec<ProductReadModel> {
        if include_inactive {
            self.projections.products.list_all()
        } else {
            self.projections.products.list_active()
        }
    }

    fn product_or_not_found(&self, product_id: ProductId) -> ServiceResult<ProductReadModel> {
        self.product(product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")).into())
    }
}
