//! # keyfront-db: Database Layer for Keyfront
//!
//! This crate provides database access for the Keyfront storefront engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Keyfront Data Flow                               │
//! │                                                                         │
//! │  keyfront-checkout (Allocator / Orchestrator / Reaper)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    keyfront-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │ (license.rs)  │    │  (embedded)  │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ SqlitePool    │    │ SkuRepo       │    │ 001_init.sql │   │   │
//! │  │   │ WAL + busy    │◄───│ LicenseRepo   │    │              │   │   │
//! │  │   │ timeout       │    │ CartRepo      │    │              │   │   │
//! │  │   │               │    │ OrderRepo     │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (sku, license, cart, order)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyfront_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/keyfront.db");
//! let db = Database::new(config).await?;
//!
//! let available = db.licenses().available_count("sku-id").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::license::{ClaimOutcome, ClaimedLicense, CommitOutcome, LicenseRepository};
pub use repository::order::OrderRepository;
pub use repository::sku::SkuRepository;
