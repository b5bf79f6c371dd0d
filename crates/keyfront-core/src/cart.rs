//! # Cart Logic
//!
//! Pure mutation functions for the shopping cart.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Client Action            Operation               Cart State Change     │
//! │  ─────────────            ─────────               ─────────────────     │
//! │                                                                         │
//! │  Add to cart ────────────► add_item() ──────────► line qty += n        │
//! │                                                    (or new line)        │
//! │  Change quantity ────────► update_quantity() ───► line qty = n         │
//! │                                                    (0 removes line)     │
//! │  Remove line ────────────► remove_item() ───────► line dropped          │
//! │                                                                         │
//! │  Clear ──────────────────► clear() ─────────────► items emptied         │
//! │                                                                         │
//! │  EVERY mutation ends with recompute_totals(): the stored totals are     │
//! │  always Σ subtotal / Σ quantity, never incrementally drifted.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These functions are pure: the persistence layer applies the same
//! semantics transactionally (UPSERT + SQL SUM recompute), and these are
//! the reference implementation it is tested against.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Cart, CartItem, Sku};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Adds a SKU to the cart or accumulates quantity if already present.
///
/// ## Behavior
/// - If the SKU already has a line: increments quantity (one line per SKU)
/// - Otherwise: appends a new line with a frozen price/name snapshot
/// - Recomputes the line subtotal and the cart totals
pub fn add_item(cart: &mut Cart, sku: &Sku, quantity: i64) -> CoreResult<()> {
    if quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }

    if let Some(item) = cart.items.iter_mut().find(|i| i.sku_id == sku.id) {
        let new_qty = item.quantity + quantity;
        if new_qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: new_qty,
                max: MAX_ITEM_QUANTITY,
            });
        }
        item.quantity = new_qty;
        item.recompute_subtotal();
        recompute_totals(cart);
        return Ok(());
    }

    if cart.items.len() >= MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }

    cart.items.push(CartItem::from_sku(sku, quantity));
    recompute_totals(cart);
    Ok(())
}

/// Sets the quantity of a line item.
///
/// ## Behavior
/// - `quantity <= 0` removes the line entirely
/// - Missing line: `ItemNotInCart`
/// - Recomputes the line subtotal and the cart totals
pub fn update_quantity(cart: &mut Cart, sku_id: &str, quantity: i64) -> CoreResult<()> {
    if quantity <= 0 {
        return remove_item(cart, sku_id);
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }

    let item = cart
        .items
        .iter_mut()
        .find(|i| i.sku_id == sku_id)
        .ok_or_else(|| CoreError::ItemNotInCart {
            sku_id: sku_id.to_string(),
        })?;

    item.quantity = quantity;
    item.recompute_subtotal();
    recompute_totals(cart);
    Ok(())
}

/// Removes a line item by SKU id.
pub fn remove_item(cart: &mut Cart, sku_id: &str) -> CoreResult<()> {
    let initial_len = cart.items.len();
    cart.items.retain(|i| i.sku_id != sku_id);

    if cart.items.len() == initial_len {
        return Err(CoreError::ItemNotInCart {
            sku_id: sku_id.to_string(),
        });
    }

    recompute_totals(cart);
    Ok(())
}

/// Empties the cart and zeroes the totals.
pub fn clear(cart: &mut Cart) {
    cart.items.clear();
    recompute_totals(cart);
}

/// Recomputes `total_amount_cents` and `total_items` from the line items.
///
/// This is the only way the totals are ever written: a full sum over the
/// lines, never an incremental adjustment that could drift.
pub fn recompute_totals(cart: &mut Cart) {
    cart.total_amount_cents = cart
        .items
        .iter()
        .map(|i| Money::from_cents(i.subtotal_cents))
        .fold(Money::zero(), |acc, m| acc + m)
        .cents();
    cart.total_items = cart.items.iter().map(|i| i.quantity).sum();
}

// =============================================================================
// Unit Tests
// =============================================================================
