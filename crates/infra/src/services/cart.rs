use chrono::{DateTime, Utc};
use serde::Serialize;

use commerce_cart::{
    AddItem, Cart, CartCommand, CartId, CartItemId, ClearCart, DeactivateCart, DeactivationReason,
    MergeGuestCart, OpenCart, Owner, RemoveItem, UpdateItem,
};
use commerce_catalog::{Product, ProductId, VariantId};
use commerce_core::{DomainError, Money, SessionKey, UserId};
use commerce_pricing::{Availability, CartTotals, compute_cart_totals, compute_line_total, validate_add};
use commerce_promotions::FlashSaleId;

use super::{CommerceServices, ServiceResult};
use crate::command_dispatcher::load_aggregate;
use crate::event_store::EventStore;
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub flash_sale: Option<FlashSaleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    /// `None` until the owner first adds something.
    pub cart_id: Option<CartId>,
    pub owner: Owner,
    pub items: Vec<CartLineView>,
    pub totals: CartTotals,
}

impl CommerceServices {
    /// The owner's active cart, opened on first use.
    pub fn get_or_create_cart(&self, owner: &Owner, now: DateTime<Utc>) -> ServiceResult<Cart> {
        let _writer = self.lock_writer()?;
        let mut uow = self.unit_of_work();
        let cart = self.cart_for_write(&mut uow, owner, now)?;
        self.commit(uow)?;
        Ok(cart)
    }

    /// Put `quantity` units in the owner's cart.
    ///
    /// Topping up an existing line re-validates the cumulative quantity and
    /// keeps the line's original unit price.
    #[tracing::instrument(skip_all, fields(%owner, %product_id, quantity = quantity))]
    pub fn add_to_cart(
        &self,
        owner: &Owner,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> ServiceResult<CartSummary> {
        {
            let _writer = self.lock_writer()?;
            let mut uow = self.unit_of_work();
            let mut cart = self.cart_for_write(&mut uow, owner, now)?;
            let product: Product = uow.load(product_id.aggregate_id())?;

            let requested = cart
                .quantity_of(product_id, variant_id)
                .checked_add(quantity)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?;
            let offer = self.projections.flash_sales.live_offer(product_id, now);
            let quote = validate_add(&product, variant_id, requested, offer.as_ref())?;

            let command = CartCommand::AddItem(AddItem {
                cart_id: cart.id_typed(),
                item_id: CartItemId::generate(),
                product_id,
                variant_id,
                quantity,
                quote,
                occurred_at: now,
            });
            uow.execute(&mut cart, &command)?;
            self.commit(uow)?;
        }
        self.cart_summary(owner)
    }

    /// Set a line's quantity; `0` removes the line.
    pub fn update_cart_item(
        &self,
        owner: &Owner,
        item_id: CartItemId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> ServiceResult<CartSummary> {
        {
            let _writer = self.lock_writer()?;
            let mut uow = self.unit_of_work();
            let mut cart = self.existing_cart(&uow, owner)?.ok_or(DomainError::ItemNotFound)?;
            let item = cart.item(item_id).cloned().ok_or(DomainError::ItemNotFound)?;

            let available = if quantity == 0 {
                Availability::Unlimited
            } else {
                let product: Product = uow.load(item.product_id.aggregate_id())?;
                validate_add(&product, item.variant_id, quantity, None)?.available
            };

            let command = CartCommand::UpdateItem(UpdateItem {
                cart_id: cart.id_typed(),
                item_id,
                quantity,
                available,
                occurred_at: now,
            });
            uow.execute(&mut cart, &command)?;
            self.commit(uow)?;
        }
        self.cart_summary(owner)
    }

    pub fn remove_cart_item(
        &self,
        owner: &Owner,
        item_id: CartItemId,
        now: DateTime<Utc>,
    ) -> ServiceResult<CartSummary> {
        {
            let _writer = self.lock_writer()?;
            let mut uow = self.unit_of_work();
            let mut cart = self.existing_cart(&uow, owner)?.ok_or(DomainError::ItemNotFound)?;
            let command = CartCommand::RemoveItem(RemoveItem {
                cart_id: cart.id_typed(),
                item_id,
                occurred_at: now,
            });
            uow.execute(&mut cart, &command)?;
            self.commit(uow)?;
        }
        self.cart_summary(owner)
    }

    pub fn clear_cart(&self, owner: &Owner, now: DateTime<Utc>) -> ServiceResult<CartSummary> {
        {
            let _writer = self.lock_writer()?;
            let mut uow = self.unit_of_work();
            if let Some(mut cart) = self.existing_cart(&uow, owner)? {
                let command = CartCommand::ClearCart(ClearCart {
                    cart_id: cart.id_typed(),
                    occurred_at: now,
                });
                uow.execute(&mut cart, &command)?;
                self.commit(uow)?;
            }
        }
        self.cart_summary(owner)
    }

    /// Fold a guest session's cart into the user's cart after login.
    ///
    /// Equivalent lines have their quantities summed (checkout re-validates
    /// stock); the guest cart is deactivated, never deleted. A missing, empty
    /// or already inactive guest cart leaves the user's cart as it is.
    #[tracing::instrument(skip_all, fields(%session, %user_id))]
    pub fn merge_carts(
        &self,
        session: &SessionKey,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> ServiceResult<CartSummary> {
        let user = Owner::User(user_id);
        {
            let _writer = self.lock_writer()?;
            let mut uow = self.unit_of_work();
            let guest_owner = Owner::Session(session.clone());
            let guest = self
                .existing_cart(&uow, &guest_owner)?
                .filter(|cart| !cart.is_empty());

            if let Some(mut guest) = guest {
                let mut target = self.cart_for_write(&mut uow, &user, now)?;
                let merge = CartCommand::MergeGuestCart(MergeGuestCart {
                    cart_id: target.id_typed(),
                    source_cart_id: guest.id_typed(),
                    guest_items: guest.items().to_vec(),
                    occurred_at: now,
                });
                uow.execute(&mut target, &merge)?;

                let deactivate = CartCommand::DeactivateCart(DeactivateCart {
                    cart_id: guest.id_typed(),
                    reason: DeactivationReason::MergedInto {
                        cart_id: target.id_typed(),
                    },
                    occurred_at: now,
                });
                uow.execute(&mut guest, &deactivate)?;
                self.commit(uow)?;
                tracing::info!(guest_cart = %guest.id_typed(), cart = %target.id_typed(), "guest cart merged");
            }
        }
        self.cart_summary(&user)
    }

    /// Lines with line totals plus cart totals under the configured pricing
    /// policy (no coupon; discounts are applied at checkout).
    pub fn cart_summary(&self, owner: &Owner) -> ServiceResult<CartSummary> {
        let Some(cart_id) = self.projections.carts.active_cart(owner) else {
            return Ok(CartSummary {
                cart_id: None,
                owner: owner.clone(),
                items: Vec::new(),
                totals: CartTotals::default(),
            });
        };
        let cart: Cart = load_aggregate(self.store.as_ref(), cart_id.aggregate_id())?;

        let mut items = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let product = self.projections.products.get(&item.product_id);
            let variant = product
                .as_ref()
                .and_then(|p| p.variants.iter().find(|v| Some(v.id) == item.variant_id));
            items.push(CartLineView {
                item_id: item.id,
                product_id: item.product_id,
                variant_id: item.variant_id,
                product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                sku: variant
                    .map(|v| v.sku.clone())
                    .or_else(|| product.as_ref().map(|p| p.sku.clone()))
                    .unwrap_or_default(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: compute_line_total(item.unit_price, item.quantity)?,
                flash_sale: item.flash_sale,
            });
        }

        Ok(CartSummary {
            cart_id: Some(cart_id),
            owner: owner.clone(),
            totals: compute_cart_totals(cart.items(), &self.pricing)?,
            items,
        })
    }

    /// The owner's active cart as of the store, if any.
    pub(super) fn existing_cart(
        &self,
        uow: &UnitOfWork<'_, dyn EventStore>,
        owner: &Owner,
    ) -> ServiceResult<Option<Cart>> {
        let Some(cart_id) = self.projections.carts.active_cart(owner) else {
            return Ok(None);
        };
        let cart: Cart = uow.load(cart_id.aggregate_id())?;
        Ok(cart.is_active().then_some(cart))
    }

    /// The owner's active cart, or a new one opened inside `uow`.
    pub(super) fn cart_for_write(
        &self,
        uow: &mut UnitOfWork<'_, dyn EventStore>,
        owner: &Owner,
        now: DateTime<Utc>,
    ) -> ServiceResult<Cart> {
        if let Some(cart) = self.existing_cart(uow, owner)? {
            return Ok(cart);
        }
        let cart_id = CartId::generate();
        let mut cart: Cart = uow.load(cart_id.aggregate_id())?;
        let command = CartCommand::OpenCart(OpenCart {
            cart_id,
            owner: owner.clone(),
            occurred_at: now,
        });
        uow.execute(&mut cart, &command)?;
        Ok(cart)
    }
}
