//! # Error Types
//!
//! Domain-specific error types for keyfront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  keyfront-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                           │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  keyfront-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  keyfront-checkout errors (separate crate)                              │
//! │  └── CheckoutError    - Allocation/orchestration failures               │
//! │                                                                         │
//! │  API errors (in app)                                                    │
//! │  └── ApiError         - What clients see (status code + body)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → ApiError → Client  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, license id, etc.)
//! 3. Errors are enum variants, never String
//! 4. Callers branch on kind, never on message text

use thiserror::Error;

use crate::types::LicenseStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-facing responses by the
/// transport layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// SKU cannot be found in the catalog.
    ///
    /// ## When This Occurs
    /// - SKU id doesn't exist
    /// - SKU was soft-deleted by catalog administration
    #[error("SKU not found: {0}")]
    SkuNotFound(String),

    /// License cannot be found.
    #[error("License not found: {0}")]
    LicenseNotFound(String),

    /// Insufficient unsold licenses to satisfy a claim.
    ///
    /// ## When This Occurs
    /// - A claim asks for more licenses than are currently unsold
    /// - A concurrent claimer won the race for the last units
    ///
    /// The failed claim leaves stock unchanged; the caller may adjust
    /// quantity and retry.
    #[error("Insufficient stock for SKU {sku_id}: available {available}, requested {requested}")]
    InsufficientStock {
        sku_id: String,
        available: i64,
        requested: i64,
    },

    /// License is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Committing a license that was never claimed (or was reaped)
    /// - Marking a license sold twice (double submission)
    /// - Marking sold a license claimed by a different checkout attempt
    #[error("License {license_id} is {current:?}, cannot transition to {requested:?}")]
    InvalidLicenseState {
        license_id: String,
        current: LicenseStatus,
        requested: LicenseStatus,
    },

    /// The referenced line item is not present in the cart.
    #[error("SKU {sku_id} is not in the cart")]
    ItemNotInCart { sku_id: String },

    /// Cart has exceeded maximum allowed distinct line items.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Checkout was attempted on a cart with no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad SKU code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
