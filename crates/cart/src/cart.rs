use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_catalog::{ProductId, VariantId};
use commerce_core::{Aggregate, AggregateRoot, DomainError, Entity, Money};
use commerce_events::Event;
use commerce_pricing::{Availability, PricedLine, StockCheck};
use commerce_promotions::FlashSaleId;

use crate::owner::Owner;

commerce_core::aggregate_id!(CartId);
commerce_core::aggregate_id!(CartItemId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Inactive,
}

/// Why a cart stopped accepting changes. Inactive carts are kept, not deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeactivationReason {
    MergedInto { cart_id: CartId },
    CheckedOut { order_number: String },
}

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    /// Price quoted when the line was created.
    pub unit_price: Money,
    pub flash_sale: Option<FlashSaleId>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn same_line(&self, product_id: ProductId, variant_id: Option<VariantId>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }
}

impl Entity for CartItem {
    type Id = CartItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl PricedLine for CartItem {
    fn unit_price(&self) -> Money {
        self.unit_price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// Aggregate root: Cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    owner: Option<Owner>,
    status: CartStatus,
    deactivation: Option<DeactivationReason>,
    items: Vec<CartItem>,
    opened_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Cart {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            owner: None,
            status: CartStatus::Active,
            deactivation: None,
            items: Vec::new(),
            opened_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn status(&self) -> CartStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status == CartStatus::Active
    }

    pub fn deactivation(&self) -> Option<&DeactivationReason> {
        self.deactivation.as_ref()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn line_for(&self, product_id: ProductId, variant_id: Option<VariantId>) -> Option<&CartItem> {
        self.items.iter().find(|i| i.same_line(product_id, variant_id))
    }

    /// Quantity already in the cart for a (product, variant) line.
    pub fn quantity_of(&self, product_id: ProductId, variant_id: Option<VariantId>) -> u32 {
        self.line_for(product_id, variant_id)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCart {
    pub cart_id: CartId,
    pub owner: Owner,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem.
///
/// `quote` must come from `validate_add` for the cumulative quantity
/// (existing line + `quantity`). `item_id` is used only if a new line is
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub quote: StockCheck,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem. `quantity == 0` removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub quantity: u32,
    pub available: Availability,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MergeGuestCart. Sent to the user's cart with the guest's lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeGuestCart {
    pub cart_id: CartId,
    pub source_cart_id: CartId,
    pub guest_items: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateCart {
    pub cart_id: CartId,
    pub reason: DeactivationReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    OpenCart(OpenCart),
    AddItem(AddItem),
    UpdateItem(UpdateItem),
    RemoveItem(RemoveItem),
    ClearCart(ClearCart),
    MergeGuestCart(MergeGuestCart),
    DeactivateCart(DeactivateCart),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpened {
    pub cart_id: CartId,
    pub owner: Owner,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub cart_id: CartId,
    pub item: CartItem,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantityChanged {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub previous_quantity: u32,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GuestItemsMerged.
///
/// `increased` holds `(line, new quantity)` for lines the user already had;
/// `moved` holds guest lines copied over unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestItemsMerged {
    pub cart_id: CartId,
    pub source_cart_id: CartId,
    pub increased: Vec<(CartItemId, u32)>,
    pub moved: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartDeactivated {
    pub cart_id: CartId,
    pub reason: DeactivationReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartOpened(CartOpened),
    ItemAdded(ItemAdded),
    ItemQuantityChanged(ItemQuantityChanged),
    ItemRemoved(ItemRemoved),
    CartCleared(CartCleared),
    GuestItemsMerged(GuestItemsMerged),
    CartDeactivated(CartDeactivated),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "cart.opened",
            CartEvent::ItemAdded(_) => "cart.item.added",
            CartEvent::ItemQuantityChanged(_) => "cart.item.quantity_changed",
            CartEvent::ItemRemoved(_) => "cart.item.removed",
            CartEvent::CartCleared(_) => "cart.cleared",
            CartEvent::GuestItemsMerged(_) => "cart.guest_items_merged",
            CartEvent::CartDeactivated(_) => "cart.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(e) => e.occurred_at,
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::ItemQuantityChanged(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
            CartEvent::GuestItemsMerged(e) => e.occurred_at,
            CartEvent::CartDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartOpened(e) => {
                self.id = e.cart_id;
                self.owner = Some(e.owner.clone());
                self.status = CartStatus::Active;
                self.items.clear();
                self.opened_at = Some(e.occurred_at);
                self.created = true;
            }
            CartEvent::ItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            CartEvent::ItemQuantityChanged(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == e.item_id) {
                    item.quantity = e.quantity;
                }
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|i| i.id != e.item_id);
            }
            CartEvent::CartCleared(_) => {
                self.items.clear();
            }
            CartEvent::GuestItemsMerged(e) => {
                for (item_id, quantity) in &e.increased {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == *item_id) {
                        item.quantity = *quantity;
                    }
                }
                self.items.extend(e.moved.iter().cloned());
            }
            CartEvent::CartDeactivated(e) => {
                self.status = CartStatus::Inactive;
                self.deactivation = Some(e.reason.clone());
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::OpenCart(cmd) => self.handle_open(cmd),
            CartCommand::AddItem(cmd) => self.handle_add_item(cmd),
            CartCommand::UpdateItem(cmd) => self.handle_update_item(cmd),
            CartCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            CartCommand::ClearCart(cmd) => self.handle_clear(cmd),
            CartCommand::MergeGuestCart(cmd) => self.handle_merge(cmd),
            CartCommand::DeactivateCart(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Cart {
    fn ensure_active(&self, cart_id: CartId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("cart"));
        }
        if self.id != cart_id {
            return Err(DomainError::invariant("cart_id mismatch"));
        }
        if self.status != CartStatus::Active {
            return Err(DomainError::invariant("cart is no longer active"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenCart) -> Result<Vec<CartEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("cart already exists"));
        }
        Ok(vec![CartEvent::CartOpened(CartOpened {
            cart_id: cmd.cart_id,
            owner: cmd.owner.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_active(cmd.cart_id)?;
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        if let Some(existing) = self.line_for(cmd.product_id, cmd.variant_id) {
            let quantity = existing
                .quantity
                .checked_add(cmd.quantity)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?;
            cmd.quote.available.ensure_covers(quantity)?;

            // The line keeps its original unit price.
            return Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
                cart_id: cmd.cart_id,
                item_id: existing.id,
                previous_quantity: existing.quantity,
                quantity,
                occurred_at: cmd.occurred_at,
            })]);
        }

        cmd.quote.available.ensure_covers(cmd.quantity)?;
        if self.item(cmd.item_id).is_some() {
            return Err(DomainError::conflict("cart item id already in use"));
        }

        Ok(vec![CartEvent::ItemAdded(ItemAdded {
            cart_id: cmd.cart_id,
            item: CartItem {
                id: cmd.item_id,
                product_id: cmd.product_id,
                variant_id: cmd.variant_id,
                quantity: cmd.quantity,
                unit_price: cmd.quote.unit_price,
                flash_sale: cmd.quote.flash_sale,
                added_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_item(&self, cmd: &UpdateItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_active(cmd.cart_id)?;
        let item = self.item(cmd.item_id).ok_or(DomainError::ItemNotFound)?;

        if cmd.quantity == 0 {
            return Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
                cart_id: cmd.cart_id,
                item_id: cmd.item_id,
                occurred_at: cmd.occurred_at,
            })]);
        }
        if cmd.quantity == item.quantity {
            return Ok(vec![]);
        }
        cmd.available.ensure_covers(cmd.quantity)?;

        Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
            cart_id: cmd.cart_id,
            item_id: cmd.item_id,
            previous_quantity: item.quantity,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_active(cmd.cart_id)?;
        if self.item(cmd.item_id).is_none() {
            return Err(DomainError::ItemNotFound);
        }
        Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
            cart_id: cmd.cart_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear(&self, cmd: &ClearCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_active(cmd.cart_id)?;
        if self.items.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::CartCleared(CartCleared {
            cart_id: cmd.cart_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Quantities are summed without a stock check; checkout re-validates.
    fn handle_merge(&self, cmd: &MergeGuestCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_active(cmd.cart_id)?;
        if cmd.source_cart_id == cmd.cart_id {
            return Err(DomainError::invariant("cannot merge a cart into itself"));
        }
        if cmd.guest_items.is_empty() {
            return Ok(vec![]);
        }

        let mut increased: Vec<(CartItemId, u32)> = Vec::new();
        let mut moved: Vec<CartItem> = Vec::new();
        for guest in &cmd.guest_items {
            if let Some(existing) = self.line_for(guest.product_id, guest.variant_id) {
                let base = increased
                    .iter()
                    .find(|(id, _)| *id == existing.id)
                    .map(|(_, q)| *q)
                    .unwrap_or(existing.quantity);
                let summed = base.saturating_add(guest.quantity);
                match increased.iter_mut().find(|(id, _)| *id == existing.id) {
                    Some(entry) => entry.1 = summed,
                    None => increased.push((existing.id, summed)),
                }
            } else if let Some(already) = moved
                .iter_mut()
                .find(|m| m.same_line(guest.product_id, guest.variant_id))
            {
                already.quantity = already.quantity.saturating_add(guest.quantity);
            } else {
                moved.push(guest.clone());
            }
        }

        Ok(vec![CartEvent::GuestItemsMerged(GuestItemsMerged {
            cart_id: cmd.cart_id,
            source_cart_id: cmd.source_cart_id,
            increased,
            moved,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_active(cmd.cart_id)?;
        Ok(vec![CartEvent::CartDeactivated(CartDeactivated {
            cart_id: cmd.cart_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::{SessionKey, UserId};
    use commerce_events::execute;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn open(owner: Owner) -> Cart {
        let id = CartId::generate();
        let mut cart = Cart::empty(id);
        execute(
            &mut cart,
            &CartCommand::OpenCart(OpenCart {
                cart_id: id,
                owner,
                occurred_at: now(),
            }),
        )
        .unwrap();
        cart
    }

    fn guest_cart() -> Cart {
        open(Owner::Session(SessionKey::parse("guest-session-1").unwrap()))
    }

    fn user_cart() -> Cart {
        open(Owner::User(UserId::new()))
    }

    fn quote(price: u64, available: Availability) -> StockCheck {
        StockCheck {
            unit_price: Money::from_minor(price),
            available,
            flash_sale: None,
        }
    }

    fn add(cart: &mut Cart, product_id: ProductId, quantity: u32, q: StockCheck) -> Result<Vec<CartEvent>, DomainError> {
        let cmd = CartCommand::AddItem(AddItem {
            cart_id: cart.id_typed(),
            item_id: CartItemId::generate(),
            product_id,
            variant_id: None,
            quantity,
            quote: q,
            occurred_at: now(),
        });
        execute(cart, &cmd)
    }

    #[test]
    fn adding_the_same_line_twice_checks_the_cumulative_quantity() {
        let mut cart = guest_cart();
        let p = ProductId::generate();

        add(&mut cart, p, 3, quote(1000, Availability::Limited(5))).unwrap();
        let err = add(&mut cart, p, 3, quote(1000, Availability::Limited(5))).unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 6,
                available: 5
            }
        );
        assert_eq!(cart.quantity_of(p, None), 3);
    }

    #[test]
    fn repeat_add_keeps_the_original_unit_price() {
        let mut cart = guest_cart();
        let p = ProductId::generate();

        add(&mut cart, p, 1, quote(1000, Availability::Unlimited)).unwrap();
        let events = add(&mut cart, p, 2, quote(1400, Availability::Unlimited)).unwrap();

        assert!(matches!(&events[0], CartEvent::ItemQuantityChanged(e) if e.quantity == 3));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].unit_price, Money::from_minor(1000));
    }

    #[test]
    fn update_to_zero_removes_only_that_item() {
        let mut cart = guest_cart();
        let keep = ProductId::generate();
        let gone = ProductId::generate();
        add(&mut cart, keep, 2, quote(500, Availability::Unlimited)).unwrap();
        add(&mut cart, gone, 1, quote(700, Availability::Unlimited)).unwrap();
        let gone_id = cart.line_for(gone, None).unwrap().id;

        let cmd = CartCommand::UpdateItem(UpdateItem {
            cart_id: cart.id_typed(),
            item_id: gone_id,
            quantity: 0,
            available: Availability::Limited(0),
            occurred_at: now(),
        });
        execute(&mut cart, &cmd).unwrap();

        assert!(cart.item(gone_id).is_none());
        assert_eq!(cart.quantity_of(keep, None), 2);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn update_beyond_availability_is_insufficient_stock() {
        let mut cart = guest_cart();
        let p = ProductId::generate();
        add(&mut cart, p, 1, quote(500, Availability::Limited(4))).unwrap();
        let item_id = cart.line_for(p, None).unwrap().id;

        let err = cart
            .handle(&CartCommand::UpdateItem(UpdateItem {
                cart_id: cart.id_typed(),
                item_id,
                quantity: 5,
                available: Availability::Limited(4),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { requested: 5, available: 4 }));
    }

    #[test]
    fn unknown_item_is_item_not_found() {
        let cart = guest_cart();
        let err = cart
            .handle(&CartCommand::RemoveItem(RemoveItem {
                cart_id: cart.id_typed(),
                item_id: CartItemId::generate(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::ItemNotFound);
    }

    #[test]
    fn merge_sums_matching_lines_and_moves_the_rest() {
        let p = ProductId::generate();
        let only_guest = ProductId::generate();

        let mut guest = guest_cart();
        add(&mut guest, p, 2, quote(1000, Availability::Limited(10))).unwrap();
        add(&mut guest, only_guest, 1, quote(300, Availability::Unlimited)).unwrap();

        let mut user = user_cart();
        add(&mut user, p, 3, quote(1000, Availability::Limited(10))).unwrap();

        let merge = CartCommand::MergeGuestCart(MergeGuestCart {
            cart_id: user.id_typed(),
            source_cart_id: guest.id_typed(),
            guest_items: guest.items().to_vec(),
            occurred_at: now(),
        });
        execute(&mut user, &merge).unwrap();

        let deactivate = CartCommand::DeactivateCart(DeactivateCart {
            cart_id: guest.id_typed(),
            reason: DeactivationReason::MergedInto {
                cart_id: user.id_typed(),
            },
            occurred_at: now(),
        });
        execute(&mut guest, &deactivate).unwrap();

        assert_eq!(user.quantity_of(p, None), 5);
        assert_eq!(user.quantity_of(only_guest, None), 1);
        assert_eq!(guest.status(), CartStatus::Inactive);
        assert_eq!(guest.items().len(), 2);
    }

    #[test]
    fn inactive_cart_rejects_changes() {
        let mut cart = guest_cart();
        let cmd = CartCommand::DeactivateCart(DeactivateCart {
            cart_id: cart.id_typed(),
            reason: DeactivationReason::CheckedOut {
                order_number: "ORD202610160001".into(),
            },
            occurred_at: now(),
        });
        execute(&mut cart, &cmd).unwrap();

        let err = add(&mut cart, ProductId::generate(), 1, quote(100, Availability::Unlimited)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn merge_preserves_total_item_count(
                guest_qty in proptest::collection::vec(1u32..20, 1..6),
                user_qty in proptest::collection::vec(1u32..20, 0..6),
            ) {
                let products: Vec<ProductId> = (0..6).map(|_| ProductId::generate()).collect();

                let mut guest = guest_cart();
                for (i, q) in guest_qty.iter().enumerate() {
                    add(&mut guest, products[i], *q, quote(100, Availability::Unlimited)).unwrap();
                }
                let mut user = user_cart();
                for (i, q) in user_qty.iter().enumerate() {
                    add(&mut user, products[i], *q, quote(100, Availability::Unlimited)).unwrap();
                }
                let before = guest.total_items() + user.total_items();

                let merge = CartCommand::MergeGuestCart(MergeGuestCart {
                    cart_id: user.id_typed(),
                    source_cart_id: guest.id_typed(),
                    guest_items: guest.items().to_vec(),
                    occurred_at: now(),
                });
                execute(&mut user, &merge).unwrap();

                prop_assert_eq!(user.total_items(), before);
            }
        }
    }
}
