use serde::{Deserialize, Serialize};

/// Order lifecycle.
///
/// ```text
/// pending -> confirmed -> processing -> shipped -> delivered
///    \           \            \            \           \
///     `-----------`------------`-> cancelled  `-> returned
/// refunded: from anything paid-for that is not pending; terminal.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
                | (Shipped | Delivered, Returned)
                | (
                    Confirmed | Processing | Shipped | Delivered | Cancelled | Returned,
                    Refunded
                )
        )
    }

    /// Statuses a customer may still cancel from.
    pub fn customer_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Stock has left the shelf and not come back.
    pub fn holds_stock(self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    PartialRefund,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending | Failed, Paid)
                | (Pending, Failed)
                | (Paid | PartialRefund, Refunded)
                | (Paid | PartialRefund, PartialRefund)
        )
    }

    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::PartialRefund)
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    const ALL: [OrderStatus; 8] = [
        Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Returned, Refunded,
    ];

    #[test]
    fn happy_path_is_linear() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Delivered.can_transition_to(Shipped));
    }

    #[test]
    fn cancel_only_before_shipping() {
        for s in [Pending, Confirmed, Processing] {
            assert!(s.can_transition_to(Cancelled), "{s}");
        }
        for s in [Shipped, Delivered, Returned, Refunded] {
            assert!(!s.can_transition_to(Cancelled), "{s}");
        }
    }

    #[test]
    fn refunded_is_terminal() {
        for s in ALL {
            assert!(!Refunded.can_transition_to(s));
        }
        assert!(!Pending.can_transition_to(Refunded));
        assert!(Cancelled.can_transition_to(Refunded));
    }

    #[test]
    fn customers_cancel_pending_or_confirmed_only() {
        let cancellable: Vec<_> = ALL.into_iter().filter(|s| s.customer_cancellable()).collect();
        assert_eq!(cancellable, vec![Pending, Confirmed]);
    }

    #[test]
    fn payment_transitions() {
        use PaymentStatus as P;
        assert!(P::Pending.can_transition_to(P::Paid));
        assert!(P::Failed.can_transition_to(P::Paid));
        assert!(P::Paid.can_transition_to(P::PartialRefund));
        assert!(P::PartialRefund.can_transition_to(P::Refunded));
        assert!(!P::Refunded.can_transition_to(P::Paid));
        assert!(!P::Pending.can_transition_to(P::Refunded));
    }
}
