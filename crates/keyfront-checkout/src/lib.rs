//! # keyfront-checkout: Cart and Checkout Orchestration
//!
//! The stateful engine between the HTTP surface and the database: cart
//! mutations, atomic license allocation, checkout, and claim recovery.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    keyfront-checkout                                     │
//! │                                                                         │
//! │  apps/api (axum handlers)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐  ┌─────────────────────┐  ┌──────────────────────┐   │
//! │  │ CartService  │  │ CheckoutOrchestrator│  │     ClaimReaper      │   │
//! │  │  (cart.rs)   │  │    (checkout.rs)    │  │     (reaper.rs)      │   │
//! │  │              │  │         │           │  │                      │   │
//! │  │ add/update/  │  │         ▼           │  │  interval sweep of   │   │
//! │  │ remove/clear │  │  LicenseAllocator   │  │  stale claims        │   │
//! │  │              │  │   (allocator.rs)    │  │                      │   │
//! │  └──────┬───────┘  └─────────┬───────────┘  └──────────┬───────────┘   │
//! │         │                    │                         │                │
//! │         ▼                    ▼                         ▼                │
//! │                     keyfront-db repositories                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`cart`] - Validated per-user cart mutations
//! - [`allocator`] - Atomic license claims with bounded retry
//! - [`checkout`] - Cart → order orchestration with compensation
//! - [`reaper`] - Background release of orphaned claims
//! - [`config`] - Timing and retry configuration
//! - [`error`] - Checkout error types

pub mod allocator;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod reaper;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::LicenseAllocator;
pub use cart::CartService;
pub use checkout::{
    CheckoutObserver, CheckoutOrchestrator, CheckoutReceipt, IssuedLicense, NoOpObserver,
};
pub use config::CheckoutConfig;
pub use error::{CheckoutError, CheckoutResult};
pub use reaper::{ClaimReaper, ClaimReaperHandle};
