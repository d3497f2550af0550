use serde::{Deserialize, Serialize};

/// Why a stock level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    Return,
    Adjustment,
    Damaged,
    Lost,
}

impl MovementType {
    /// Check the sign of `delta` against the movement kind.
    pub fn accepts(self, delta: i64) -> bool {
        match self {
            MovementType::Purchase | MovementType::Return => delta > 0,
            MovementType::Sale | MovementType::Damaged | MovementType::Lost => delta < 0,
            MovementType::Adjustment => delta != 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::Return => "return",
            MovementType::Adjustment => "adjustment",
            MovementType::Damaged => "damaged",
            MovementType::Lost => "lost",
        }
    }
}

/// Shopper-facing availability bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Backorder,
}

impl StockStatus {
    pub fn classify(
        stock: i64,
        low_stock_threshold: u32,
        track_inventory: bool,
        allow_backorder: bool,
    ) -> Self {
        if !track_inventory {
            return StockStatus::InStock;
        }
        if stock <= 0 {
            return if allow_backorder {
                StockStatus::Backorder
            } else {
                StockStatus::OutOfStock
            };
        }
        if stock <= i64::from(low_stock_threshold) {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_sign_rules() {
        assert!(MovementType::Purchase.accepts(5));
        assert!(!MovementType::Purchase.accepts(-5));
        assert!(MovementType::Sale.accepts(-1));
        assert!(!MovementType::Sale.accepts(1));
        assert!(MovementType::Adjustment.accepts(-3));
        assert!(!MovementType::Adjustment.accepts(0));
    }

    #[test]
    fn classify_buckets() {
        assert_eq!(StockStatus::classify(50, 10, true, false), StockStatus::InStock);
        assert_eq!(StockStatus::classify(10, 10, true, false), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(0, 10, true, false), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(-2, 10, true, true), StockStatus::Backorder);
        assert_eq!(StockStatus::classify(0, 10, false, false), StockStatus::InStock);
    }
}
