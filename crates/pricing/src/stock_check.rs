use serde::{Deserialize, Serialize};

use commerce_catalog::{Product, VariantId};
use commerce_core::{DomainError, DomainResult, Money};
use commerce_promotions::{FlashSaleId, SaleOffer};

/// How many units can still be put in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum Availability {
    /// Backorders allowed or inventory not tracked.
    Unlimited,
    Limited(u32),
}

impl Availability {
    fn for_stock(stock: i64, track_inventory: bool, allow_backorder: bool) -> Self {
        if !track_inventory || allow_backorder {
            return Availability::Unlimited;
        }
        Availability::Limited(u32::try_from(stock.max(0)).unwrap_or(u32::MAX))
    }

    pub fn ensure_covers(self, requested: u32) -> DomainResult<()> {
        match self {
            Availability::Unlimited => Ok(()),
            Availability::Limited(available) if requested <= available => Ok(()),
            Availability::Limited(available) => Err(DomainError::InsufficientStock {
                requested,
                available,
            }),
        }
    }
}

/// Outcome of a successful add-to-cart validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCheck {
    pub unit_price: Money,
    pub available: Availability,
    /// Set when `unit_price` is a flash-sale price.
    pub flash_sale: Option<FlashSaleId>,
}

/// Validate putting `requested` units of a product (or one of its variants) in
/// a cart, and quote the unit price.
///
/// Callers pass the cumulative quantity when topping up an existing line.
pub fn validate_add(
    product: &Product,
    variant_id: Option<VariantId>,
    requested: u32,
    offer: Option<&SaleOffer>,
) -> DomainResult<StockCheck> {
    if !product.can_be_sold() {
        return Err(DomainError::not_found(format!("product {}", product.id_typed())));
    }
    if requested == 0 {
        return Err(DomainError::validation("quantity must be at least 1"));
    }

    let variant = match variant_id {
        Some(id) => {
            let variant = product
                .variant(id)
                .filter(|v| v.active)
                .ok_or_else(|| DomainError::not_found(format!("variant {id}")))?;
            Some(variant)
        }
        None => None,
    };

    let available = Availability::for_stock(
        product.effective_stock(variant),
        product.track_inventory(),
        product.allow_backorder(),
    );
    available.ensure_covers(requested)?;

    let sale = offer
        .filter(|o| o.product_id == product.id_typed())
        .filter(|o| o.covers(requested));

    Ok(StockCheck {
        unit_price: sale
            .map(|o| o.sale_price)
            .unwrap_or_else(|| product.effective_price(variant)),
        available,
        flash_sale: sale.map(|o| o.sale_id),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use commerce_catalog::{
        ActivateProduct, AddVariant, CreateProduct, ProductCommand, ProductId,
    };
    use commerce_events::execute;

    use super::*;

    fn product(stock: u32, backorder: bool, track_inventory: bool) -> Product {
        let id = ProductId::generate();
        let mut p = Product::empty(id);
        execute(
            &mut p,
            &ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                sku: "MUG-01".into(),
                name: "Mug".into(),
                description: String::new(),
                category_id: None,
                price: Money::from_minor(1200),
                initial_stock: stock,
                low_stock_threshold: 1,
                track_inventory,
                allow_backorder: backorder,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        execute(
            &mut p,
            &ProductCommand::ActivateProduct(ActivateProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        p
    }

    fn with_variant(mut p: Product, price: Option<u64>, stock: Option<u32>) -> (Product, VariantId) {
        let variant_id = VariantId::generate();
        let cmd = ProductCommand::AddVariant(AddVariant {
            product_id: p.id_typed(),
            variant_id,
            sku: "MUG-01-BLUE".into(),
            name: "Blue".into(),
            attributes: BTreeMap::new(),
            price: price.map(Money::from_minor),
            stock_quantity: stock,
            occurred_at: Utc::now(),
        });
        execute(&mut p, &cmd).unwrap();
        (p, variant_id)
    }

    #[test]
    fn quantity_within_stock_is_quoted_at_product_price() {
        let p = product(5, false, true);
        let check = validate_add(&p, None, 3, None).unwrap();
        assert_eq!(check.unit_price, Money::from_minor(1200));
        assert_eq!(check.available, Availability::Limited(5));
        assert!(check.flash_sale.is_none());
    }

    #[test]
    fn quantity_over_stock_is_insufficient() {
        let p = product(5, false, true);
        assert_eq!(
            validate_add(&p, None, 6, None).unwrap_err(),
            DomainError::InsufficientStock {
                requested: 6,
                available: 5
            }
        );
    }

    #[test]
    fn backorder_and_untracked_inventory_never_run_out() {
        let p = product(0, true, true);
        assert_eq!(validate_add(&p, None, 100, None).unwrap().available, Availability::Unlimited);

        let p = product(0, false, false);
        assert!(validate_add(&p, None, 100, None).is_ok());
    }

    #[test]
    fn variant_overrides_price_and_stock() {
        let (p, v) = with_variant(product(50, false, true), Some(1500), Some(2));
        let check = validate_add(&p, Some(v), 2, None).unwrap();
        assert_eq!(check.unit_price, Money::from_minor(1500));
        assert!(matches!(
            validate_add(&p, Some(v), 3, None),
            Err(DomainError::InsufficientStock { available: 2, .. })
        ));
    }

    #[test]
    fn unknown_variant_is_not_found() {
        let p = product(5, false, true);
        assert!(matches!(
            validate_add(&p, Some(VariantId::generate()), 1, None),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn draft_product_is_not_sellable() {
        let id = ProductId::generate();
        let p = Product::empty(id);
        assert!(matches!(validate_add(&p, None, 1, None), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn flash_sale_price_applies_only_when_cap_covers_quantity() {
        let p = product(50, false, true);
        let offer = SaleOffer {
            sale_id: FlashSaleId::generate(),
            product_id: p.id_typed(),
            sale_price: Money::from_minor(900),
            remaining: Some(2),
        };

        let on_sale = validate_add(&p, None, 2, Some(&offer)).unwrap();
        assert_eq!(on_sale.unit_price, Money::from_minor(900));
        assert_eq!(on_sale.flash_sale, Some(offer.sale_id));

        let regular = validate_add(&p, None, 3, Some(&offer)).unwrap();
        assert_eq!(regular.unit_price, Money::from_minor(1200));
        assert!(regular.flash_sale.is_none());
    }
}
