//! Shopping cart domain (event-sourced).
//!
//! A cart belongs to a registered user or to an anonymous session. Lines are
//! unique per (product, variant) and keep the unit price quoted when they were
//! first added. Stock and price quotes come from `commerce-pricing`; the cart
//! only checks cumulative quantities against the quote it is given.

pub mod cart;
pub mod owner;

pub use cart::{
    AddItem, Cart, CartCleared, CartCommand, CartDeactivated, CartEvent, CartId, CartItem,
    CartItemId, CartOpened, CartStatus, ClearCart, DeactivateCart, DeactivationReason,
    GuestItemsMerged, ItemAdded, ItemQuantityChanged, ItemRemoved, MergeGuestCart, OpenCart,
    RemoveItem, UpdateItem,
};
pub use owner::Owner;
