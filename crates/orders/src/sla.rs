use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SHIP_WITHIN_DAYS: i64 = 2;
const DELIVER_WITHIN_DAYS: i64 = 5;
const BACKORDER_DELIVER_WITHIN_DAYS: i64 = 10;

/// Fulfilment deadlines promised when an order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentSla {
    pub ship_by: DateTime<Utc>,
    pub deliver_by: DateTime<Utc>,
}

impl FulfillmentSla {
    pub fn for_order(placed_at: DateTime<Utc>, has_backorder: bool) -> Self {
        let deliver_days = if has_backorder {
            BACKORDER_DELIVER_WITHIN_DAYS
        } else {
            DELIVER_WITHIN_DAYS
        };
        Self {
            ship_by: placed_at + Duration::days(SHIP_WITHIN_DAYS),
            deliver_by: placed_at + Duration::days(deliver_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn regular_and_backordered_deadlines() {
        let placed = Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap();

        let regular = FulfillmentSla::for_order(placed, false);
        assert_eq!(regular.ship_by, Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap());
        assert_eq!(regular.deliver_by, Utc.with_ymd_and_hms(2026, 10, 21, 10, 0, 0).unwrap());

        let backordered = FulfillmentSla::for_order(placed, true);
        assert_eq!(backordered.ship_by, regular.ship_by);
        assert_eq!(backordered.deliver_by, Utc.with_ymd_and_hms(2026, 10, 26, 10, 0, 0).unwrap());
    }
}
