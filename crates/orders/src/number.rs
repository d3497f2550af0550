use chrono::{DateTime, Utc};

use commerce_core::{DailySequence, DomainResult};

/// Issues `ORD202610160001`-style order numbers.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    sequence: DailySequence,
}

impl OrderNumberGenerator {
    pub const DEFAULT_PREFIX: &'static str = "ORD";

    pub fn new(prefix: impl Into<String>) -> DomainResult<Self> {
        Ok(Self {
            sequence: DailySequence::new(prefix)?,
        })
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> DomainResult<String> {
        self.sequence.next(now)
    }

    /// Seed from a number issued before a restart.
    pub fn observe(&mut self, order_number: &str) {
        self.sequence.observe(order_number);
    }

    pub fn prefix(&self) -> &str {
        self.sequence.prefix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn monotonic_within_a_day_and_reset_on_the_next() {
        let mut numbers = OrderNumberGenerator::new(OrderNumberGenerator::DEFAULT_PREFIX).unwrap();
        let day1 = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();

        let a = numbers.next(day1).unwrap();
        let b = numbers.next(day1).unwrap();
        let c = numbers.next(day2).unwrap();

        assert_eq!(a, "ORD202610160001");
        assert_eq!(b, "ORD202610160002");
        assert!(b > a);
        assert_eq!(c, "ORD202610170001");
    }

    #[test]
    fn restart_resumes_after_observed_numbers() {
        let mut numbers = OrderNumberGenerator::new("SHOP").unwrap();
        numbers.observe("SHOP202610160012");
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        assert_eq!(numbers.next(now).unwrap(), "SHOP202610160013");
    }
}
