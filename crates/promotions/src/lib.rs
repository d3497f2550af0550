//! Promotions: coupons and flash sales.
//!
//! Both carry usage counters (`used_count`, `sold_quantity`) that only move
//! through checkout, inside the same atomic commit as the order.

pub mod coupon;
pub mod discount;
pub mod flash_sale;

pub use coupon::{
    Coupon, CouponCode, CouponCommand, CouponCreated, CouponDeactivated, CouponEvent, CouponId,
    CouponRedeemed, CreateCoupon, DeactivateCoupon, RedeemCoupon,
};
pub use discount::{DiscountRule, DiscountSplit};
pub use flash_sale::{
    AddSaleItem, CreateFlashSale, EndFlashSale, FlashSale, FlashSaleCommand, FlashSaleCreated,
    FlashSaleEnded, FlashSaleEvent, FlashSaleId, FlashSaleItem, RecordSale, SaleItemAdded,
    SaleOffer, SaleRecorded,
};
