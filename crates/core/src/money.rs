//! Money in minor currency units.
//!
//! Amounts are whole cents, so line totals and sums are exact. Division only
//! happens for percentages, where [`Money::percent_bps`] rounds half-up.

use core::fmt;
use core::iter::Sum;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Non-negative amount in the smallest currency unit (e.g. cents).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole currency units (`Money::from_major(12)` is `12.00`).
    pub fn from_major(units: u64) -> DomainResult<Self> {
        units
            .checked_mul(100)
            .map(Self)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub fn checked_mul(self, qty: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(qty))
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Subtract, flooring at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// `self * bps / 10_000`, rounded half-up (`1000` bps is 10%).
    pub fn percent_bps(self, bps: u32) -> Money {
        let scaled = u128::from(self.0) * u128::from(bps);
        let rounded = (scaled + 5_000) / 10_000;
        Money(u64::try_from(rounded).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Parses `"12"`, `"12.5"` or `"12.50"`. More than two decimals is rejected.
impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::validation(format!("invalid amount: {s:?}"));

        let (whole, frac) = match s.split_once('.') {
            Some((_, "")) => return Err(invalid()),
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        Money::from_major(whole)?.checked_add(Money(cents))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| Money(acc.0.saturating_add(m.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn displays_with_two_decimals() {
        assert_eq!(Money::from_minor(18000).to_string(), "180.00");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
    }

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("12".parse::<Money>().unwrap(), Money::from_minor(1200));
        assert_eq!("12.5".parse::<Money>().unwrap(), Money::from_minor(1250));
        assert_eq!("0.07".parse::<Money>().unwrap(), Money::from_minor(7));
        assert!("1.005".parse::<Money>().is_err());
        assert!("-1".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
        assert!("12.".parse::<Money>().is_err());
        assert!(".".parse::<Money>().is_err());
    }

    #[test]
    fn percent_rounds_half_up() {
        // 10% of 200.00
        assert_eq!(Money::from_minor(20000).percent_bps(1000), Money::from_minor(2000));
        // 15% of 0.05 = 0.0075 -> 0.01
        assert_eq!(Money::from_minor(5).percent_bps(1500), Money::from_minor(1));
        // 10% of 0.04 = 0.004 -> 0.00
        assert_eq!(Money::from_minor(4).percent_bps(1000), Money::ZERO);
    }

    #[test]
    fn multiplication_overflow_is_an_error() {
        assert!(Money::from_minor(u64::MAX).checked_mul(2).is_err());
    }

    proptest! {
        #[test]
        fn multiplication_is_exact(cents in 0u64..10_000_000, qty in 0u32..10_000) {
            let total = Money::from_minor(cents).checked_mul(qty).unwrap();
            prop_assert_eq!(total.minor(), cents * u64::from(qty));
        }

        #[test]
        fn display_then_parse_is_identity(cents in 0u64..1_000_000_000) {
            let m = Money::from_minor(cents);
            prop_assert_eq!(m.to_string().parse::<Money>().unwrap(), m);
        }
    }
}
