use serde::{Deserialize, Serialize};

use commerce_core::{DomainResult, Money};
use commerce_promotions::DiscountSplit;

use crate::policy::PricingPolicy;

/// Anything with a unit price and a quantity (cart lines, order lines).
pub trait PricedLine {
    fn unit_price(&self) -> Money;
    fn quantity(&self) -> u32;
}

impl PricedLine for (Money, u32) {
    fn unit_price(&self) -> Money {
        self.0
    }

    fn quantity(&self) -> u32 {
        self.1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub total_items: u32,
}

/// `unit_price * quantity`, exact in minor units.
pub fn compute_line_total(unit_price: Money, quantity: u32) -> DomainResult<Money> {
    unit_price.checked_mul(quantity)
}

/// Totals without any coupon.
pub fn compute_cart_totals<L: PricedLine>(
    lines: &[L],
    policy: &PricingPolicy,
) -> DomainResult<CartTotals> {
    compute_totals(lines, policy, |_, _| DiscountSplit::NONE)
}

/// Totals with a discount derived from `(subtotal, shipping)`.
///
/// The goods part is clamped to the subtotal and the shipping part to the
/// shipping charge. Tax is charged on the subtotal after the goods part only.
pub fn compute_totals<L, F>(
    lines: &[L],
    policy: &PricingPolicy,
    discount: F,
) -> DomainResult<CartTotals>
where
    L: PricedLine,
    F: FnOnce(Money, Money) -> DiscountSplit,
{
    let mut subtotal = Money::ZERO;
    let mut total_items: u32 = 0;
    for line in lines {
        subtotal = subtotal.checked_add(compute_line_total(line.unit_price(), line.quantity())?)?;
        total_items = total_items.saturating_add(line.quantity());
    }

    let shipping = policy.shipping_for(subtotal);
    let split = discount(subtotal, shipping);
    let goods_discount = split.goods.min(subtotal);
    let discount = goods_discount.checked_add(split.shipping.min(shipping))?;
    let taxable = subtotal.saturating_sub(goods_discount);
    let tax = policy.tax_on(taxable);
    let total = subtotal
        .checked_add(shipping)?
        .checked_add(tax)?
        .saturating_sub(discount);

    Ok(CartTotals {
        subtotal,
        tax,
        shipping,
        discount,
        total,
        total_items,
    })
}
