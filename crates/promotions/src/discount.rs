use serde::{Deserialize, Serialize};

use commerce_core::{DomainError, DomainResult, Money};

/// How a coupon reduces an order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountRule {
    /// `basis_points / 100` percent of the subtotal, optionally capped.
    Percentage {
        basis_points: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_discount: Option<Money>,
    },
    /// Flat amount off, never more than the subtotal.
    Fixed { amount: Money },
    /// Waives the shipping charge.
    FreeShipping,
}

impl DiscountRule {
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            DiscountRule::Percentage { basis_points, .. } => {
                if *basis_points == 0 || *basis_points > 10_000 {
                    return Err(DomainError::validation(
                        "percentage discount must be between 0.01% and 100%",
                    ));
                }
            }
            DiscountRule::Fixed { amount } => {
                if amount.is_zero() {
                    return Err(DomainError::validation("fixed discount must be positive"));
                }
            }
            DiscountRule::FreeShipping => {}
        }
        Ok(())
    }

    /// Total amount taken off an order with this `subtotal` and `shipping`.
    pub fn discount_for(&self, subtotal: Money, shipping: Money) -> Money {
        self.split(subtotal, shipping).total()
    }

    /// The discount divided between goods and the shipping charge. Only the
    /// goods part lowers the taxable amount.
    pub fn split(&self, subtotal: Money, shipping: Money) -> DiscountSplit {
        match self {
            DiscountRule::Percentage {
                basis_points,
                max_discount,
            } => {
                let raw = subtotal.percent_bps(*basis_points);
                let goods = match max_discount {
                    Some(cap) => raw.min(*cap),
                    None => raw,
                };
                DiscountSplit::on_goods(goods.min(subtotal))
            }
            DiscountRule::Fixed { amount } => DiscountSplit::on_goods((*amount).min(subtotal)),
            DiscountRule::FreeShipping => DiscountSplit {
                goods: Money::ZERO,
                shipping,
            },
        }
    }
}

/// A discount broken down by what it reduces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscountSplit {
    pub goods: Money,
    pub shipping: Money,
}

impl DiscountSplit {
    pub const NONE: DiscountSplit = DiscountSplit {
        goods: Money::ZERO,
        shipping: Money::ZERO,
    };

    pub fn on_goods(goods: Money) -> Self {
        Self {
            goods,
            shipping: Money::ZERO,
        }
    }

    pub fn total(&self) -> Money {
        [self.goods, self.shipping].into_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ten_percent_of_two_hundred_is_twenty() {
        let rule = DiscountRule::Percentage {
            basis_points: 1000,
            max_discount: None,
        };
        assert_eq!(
            rule.discount_for(Money::from_minor(20000), Money::ZERO),
            Money::from_minor(2000)
        );
    }

    #[test]
    fn percentage_is_capped() {
        let rule = DiscountRule::Percentage {
            basis_points: 5000,
            max_discount: Some(Money::from_minor(1500)),
        };
        assert_eq!(
            rule.discount_for(Money::from_minor(10000), Money::ZERO),
            Money::from_minor(1500)
        );
    }

    #[test]
    fn fixed_never_exceeds_subtotal_and_free_shipping_waives_shipping() {
        let fixed = DiscountRule::Fixed {
            amount: Money::from_minor(5000),
        };
        assert_eq!(
            fixed.discount_for(Money::from_minor(3000), Money::from_minor(500)),
            Money::from_minor(3000)
        );
        assert_eq!(
            DiscountRule::FreeShipping.discount_for(Money::from_minor(3000), Money::from_minor(500)),
            Money::from_minor(500)
        );
    }

    #[test]
    fn free_shipping_discounts_shipping_only() {
        let split = DiscountRule::FreeShipping.split(Money::from_minor(2000), Money::from_minor(500));
        assert_eq!(split.goods, Money::ZERO);
        assert_eq!(split.shipping, Money::from_minor(500));

        let pct = DiscountRule::Percentage {
            basis_points: 1000,
            max_discount: None,
        }
        .split(Money::from_minor(2000), Money::from_minor(500));
        assert_eq!(pct, DiscountSplit::on_goods(Money::from_minor(200)));
    }

    #[test]
    fn out_of_range_percentages_are_rejected() {
        let over = DiscountRule::Percentage {
            basis_points: 10_001,
            max_discount: None,
        };
        assert!(over.validate().is_err());
        assert!(DiscountRule::Fixed { amount: Money::ZERO }.validate().is_err());
    }

    proptest! {
        #[test]
        fn goods_discount_never_exceeds_subtotal(
            subtotal in 0u64..10_000_000,
            shipping in 0u64..10_000,
            bps in 1u32..=10_000,
            fixed in 1u64..10_000_000,
        ) {
            let (subtotal, shipping) = (Money::from_minor(subtotal), Money::from_minor(shipping));
            let rules = [
                DiscountRule::Percentage { basis_points: bps, max_discount: None },
                DiscountRule::Fixed { amount: Money::from_minor(fixed) },
            ];
            for rule in rules {
                let split = rule.split(subtotal, shipping);
                prop_assert!(split.goods <= subtotal);
                prop_assert_eq!(split.shipping, Money::ZERO);
            }
        }
    }
}
