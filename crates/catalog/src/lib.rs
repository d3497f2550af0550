//! Catalog domain: products, their variants, categories and stock movements.
//!
//! Pure, deterministic aggregates. Stock lives on the product (or on a variant
//! that overrides it) and only changes through `AdjustStock`, which records
//! the movement type and the before/after quantities.

pub mod category;
pub mod product;
pub mod stock;
pub mod variant;

pub use category::{
    Category, CategoryCommand, CategoryCreated, CategoryDeactivated, CategoryEvent, CategoryId,
    CreateCategory, DeactivateCategory,
};
pub use product::{
    ActivateProduct, AddVariant, AdjustStock, ArchiveProduct, ChangePrice, CreateProduct,
    PriceChanged, Product, ProductActivated, ProductArchived, ProductCommand, ProductCreated,
    ProductDetailsUpdated, ProductEvent, ProductId, ProductStatus, StockAdjusted,
    UpdateProductDetails, VariantAdded,
};
pub use stock::{MovementType, StockStatus};
pub use variant::{ProductVariant, VariantId};
