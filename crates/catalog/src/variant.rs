use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use commerce_core::{Entity, Money};

commerce_core::aggregate_id!(
    /// Variant identifier. Variants live inside their product's stream.
    VariantId
);

/// A purchasable attribute combination of a product (e.g. size M, colour red).
///
/// `price` and `stock_quantity` override the product's values when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub sku: String,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<i64>,
    pub active: bool,
}

impl Entity for ProductVariant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
