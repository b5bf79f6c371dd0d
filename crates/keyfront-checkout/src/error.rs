//! # Checkout Error Types
//!
//! Error types for cart mutations, allocation and checkout.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Client Input  │  │   Allocation    │  │     Infrastructure      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  EmptyCart      │  │  Insufficient   │  │  Conflict (retried,     │ │
//! │  │  SkuNotFound    │  │    Stock        │  │    still contended)     │ │
//! │  │  Core(..)       │  │  InvalidState   │  │  Timeout                │ │
//! │  │                 │  │                 │  │  Db(..)                 │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Client-input errors are the caller's fault and must not be retried.
//! `Conflict` and `Timeout` are transient: the *client* may retry the whole
//! request, and no inventory is left claimed behind either of them.

use thiserror::Error;

use keyfront_core::CoreError;
use keyfront_db::DbError;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Checkout error type covering cart, allocation and orchestration failures.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was attempted on a cart with no line items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A SKU referenced by the request does not exist or is inactive.
    #[error("SKU not found: {0}")]
    SkuNotFound(String),

    /// Not enough unsold licenses to cover a requested quantity.
    ///
    /// Nothing was claimed: the allocation is all-or-nothing per SKU and
    /// fully compensated across SKUs.
    #[error("Insufficient stock for SKU {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        sku_id: String,
        requested: i64,
        available: i64,
    },

    /// A license was not in the state an operation required (e.g. a claim
    /// was reaped before the checkout could commit it).
    #[error("Invalid license state: {0}")]
    InvalidState(String),

    /// Write-lock contention that survived the bounded retry.
    ///
    /// Transient: the client may retry the request.
    #[error("Transient conflict, please retry: {0}")]
    Conflict(String),

    /// The checkout exceeded its overall deadline and was compensated.
    #[error("Checkout timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Domain rule violation from keyfront-core (caps, validation,
    /// missing cart line).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure that is not lock contention.
    #[error("Database error: {0}")]
    Db(DbError),
}

/// Convert database errors, routing lock contention to its own category.
///
/// `DbError::Busy` must never be folded into the generic `Db` variant:
/// callers map `Conflict` to "retry later" and everything else to a hard
/// failure.
impl From<DbError> for CheckoutError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Busy(msg) => CheckoutError::Conflict(msg),
            other => CheckoutError::Db(other),
        }
    }
}

impl CheckoutError {
    /// Whether the client may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckoutError::Conflict(_) | CheckoutError::Timeout(_))
    }
}
