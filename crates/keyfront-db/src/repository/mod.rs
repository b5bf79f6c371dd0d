//! # Repository Module
//!
//! Database repository implementations for Keyfront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.   │
//! │                                                                         │
//! │  Checkout Orchestrator                                                  │
//! │       │                                                                 │
//! │       │  db.licenses().claim_batch("sku-1", 2, "attempt-id")            │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  LicenseRepository                                                      │
//! │  ├── create_batch(&self, sku, count)                                    │
//! │  ├── available_count(&self, sku_id)                                     │
//! │  ├── claim_batch(&self, sku_id, quantity, claimant)                     │
//! │  ├── release(&self, license_id)                                         │
//! │  └── mark_sold(&self, license_id, claimant, order_id)                    │
//! │       │                                                                 │
//! │       │  SQL (status-guarded UPDATEs)                                   │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                         │
//! │  • SQL is isolated in one place                                         │
//! │  • State transitions are guarded in the query, not in caller logic      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`sku::SkuRepository`] - Catalog lookup and administrative SKU CRUD
//! - [`license::LicenseRepository`] - License pool: batch creation, atomic
//!   claim/release/commit
//! - [`cart::CartRepository`] - Per-user carts with recomputed totals
//! - [`order::OrderRepository`] - Order + item snapshot recording

pub mod cart;
pub mod license;
pub mod order;
pub mod sku;
