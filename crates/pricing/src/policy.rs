use serde::{Deserialize, Serialize};

use commerce_core::Money;

/// Tax and shipping configuration.
///
/// The default charges neither, so cart totals are the plain subtotal less
/// any coupon discount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax on the discounted subtotal, in basis points (`2000` = 20%).
    pub tax_rate_bps: u32,
    /// Shipping charged on any non-empty order.
    pub flat_shipping: Money,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_over: Option<Money>,
}

impl PricingPolicy {
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal.is_zero() {
            return Money::ZERO;
        }
        match self.free_shipping_over {
            Some(threshold) if subtotal >= threshold => Money::ZERO,
            _ => self.flat_shipping,
        }
    }

    pub fn tax_on(&self, taxable: Money) -> Money {
        taxable.percent_bps(self.tax_rate_bps)
    }
}
