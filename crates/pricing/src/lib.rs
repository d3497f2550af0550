//! Pricing and stock validation.
//!
//! Pure functions over catalog and promotion state: what a line costs, whether
//! the requested quantity is available, and what a cart adds up to. Callers
//! load the current product (and any live flash-sale offer) and pass it in.

pub mod policy;
pub mod stock_check;
pub mod totals;

pub use policy::PricingPolicy;
pub use stock_check::{Availability, StockCheck, validate_add};
pub use totals::{CartTotals, PricedLine, compute_cart_totals, compute_line_total, compute_totals};
