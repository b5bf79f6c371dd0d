//! # Domain Types
//!
//! Core domain types used throughout Keyfront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sku        │   │     License     │   │      Cart       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  code (business)│   │  sku_id (FK)    │   │  user_id        │       │
//! │  │  name           │   │  token (unique) │   │  status         │       │
//! │  │  price_cents    │   │  status         │   │  items          │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  LicenseStatus  │   │   CartStatus    │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Unsold         │   │  Active         │   │  id (UUID)      │       │
//! │  │  Claimed        │   │  Abandoned      │   │  user_id        │       │
//! │  │  Sold           │   │  Converted      │   │  total_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku code, license token) - human-readable, potentially mutable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// SKU
// =============================================================================

/// A sellable configuration of a product.
///
/// A SKU owns zero or more License records; its `price_cents` is the
/// price frozen into cart lines when the SKU is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sku {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Parent product this configuration belongs to.
    pub product_id: String,

    /// Stock Keeping Unit code - business identifier (e.g. "PRO-1Y").
    pub code: String,

    /// Display name shown in carts and on orders.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Whether licenses of this SKU never expire.
    pub is_lifetime: bool,

    /// Validity period in days (None for lifetime SKUs).
    pub validity_days: Option<i64>,

    /// Whether the SKU is purchasable (soft delete).
    pub is_active: bool,

    /// When the SKU was created.
    pub created_at: DateTime<Utc>,

    /// When the SKU was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Sku {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// License Status
// =============================================================================

/// The lifecycle state of a single license unit.
///
/// ## State Machine
/// ```text
///   unsold ──claim──► claimed ──commit──► sold   (terminal)
///     ▲                  │
///     └─────release──────┘
/// ```
/// A license never leaves `sold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Available for sale.
    Unsold,
    /// Temporarily reserved by a checkout attempt.
    Claimed,
    /// Durably assigned to an order.
    Sold,
}

impl Default for LicenseStatus {
    fn default() -> Self {
        LicenseStatus::Unsold
    }
}

// =============================================================================
// License
// =============================================================================

/// A single sellable unit of a SKU.
///
/// Created administratively in batches; destroyed only with the parent
/// product. The `token` is the value actually delivered to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct License {
    pub id: String,
    pub sku_id: String,
    /// Unique, single-use inventory token (e.g. "PRO-1Y-0007-a41c9f02").
    pub token: String,
    pub status: LicenseStatus,
    /// Checkout attempt currently holding the claim (while `claimed`).
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub sold_at: Option<DateTime<Utc>>,
    /// Order the license was committed to (once `sold`).
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cart Status
// =============================================================================

/// The lifecycle state of a cart.
///
/// `Converted` and `Abandoned` are terminal for a cart instance; a fresh
/// `Active` cart is created on the user's next add-to-cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    /// Being mutated by the user.
    Active,
    /// Idle-expired without checkout.
    Abandoned,
    /// Successfully checked out into an order.
    Converted,
}

impl Default for CartStatus {
    fn default() -> Self {
        CartStatus::Active
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// A line item in a cart.
///
/// Uses the snapshot pattern: `name` and `price_cents` are frozen copies of
/// the SKU at time of adding. `subtotal_cents` is **always**
/// `price_cents * quantity` and is recomputed on every mutation - it is
/// never accepted from caller input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub product_id: String,
    pub sku_id: String,
    /// SKU name at time of adding (frozen).
    pub name: String,
    /// Unit price in cents at time of adding (frozen).
    pub price_cents: i64,
    /// Quantity in cart (always >= 1; 0 removes the line).
    pub quantity: i64,
    /// Line subtotal: price_cents × quantity, recomputed on every mutation.
    pub subtotal_cents: i64,
}

impl CartItem {
    /// Creates a new cart line from a SKU snapshot and quantity.
    pub fn from_sku(sku: &Sku, quantity: i64) -> Self {
        CartItem {
            product_id: sku.product_id.clone(),
            sku_id: sku.id.clone(),
            name: sku.name.clone(),
            price_cents: sku.price_cents,
            quantity,
            subtotal_cents: Money::from_cents(sku.price_cents)
                .multiply_quantity(quantity)
                .cents(),
        }
    }

    /// Recomputes the subtotal from price and quantity.
    ///
    /// Called after every quantity change so the stored subtotal can never
    /// drift from `price × quantity`.
    pub fn recompute_subtotal(&mut self) {
        self.subtotal_cents = Money::from_cents(self.price_cents)
            .multiply_quantity(self.quantity)
            .cents();
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A per-user collection of intended-purchase line items.
///
/// ## Invariants
/// - At most one `Active` cart per user (enforced by a partial unique index)
/// - At most one line per `(cart, sku)` - re-adding accumulates quantity
/// - `total_amount_cents == Σ item.subtotal_cents`
/// - `total_items == Σ item.quantity`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub total_amount_cents: i64,
    pub total_items: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the cart idle-expires (refreshed on every mutation).
    pub expires_at: DateTime<Utc>,
}

impl Cart {
    /// Checks if the cart has no line items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finds a line item by SKU id.
    pub fn item(&self, sku_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.sku_id == sku_id)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A committed order produced by a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total_amount_cents: i64,
    pub total_items: i64,
    pub created_at: DateTime<Utc>,
}

/// A line item snapshot on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub sku_id: String,
    /// SKU name at time of sale (frozen).
    pub name: String,
    /// Unit price in cents at time of sale (frozen).
    pub price_cents: i64,
    pub quantity: i64,
    pub subtotal_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
