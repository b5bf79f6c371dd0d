//! # SKU Repository
//!
//! Database operations for the product catalog (read side of the engine).
//!
//! The storefront engine treats the catalog as a mostly-read collaborator:
//! cart additions validate the SKU and freeze its price/name from here,
//! never from client input. Administrative insert/soft-delete exist for
//! seeding and teardown.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use keyfront_core::Sku;

/// All SKU columns, in the order the `Sku` struct expects.
const SKU_COLUMNS: &str = "id, product_id, code, name, price_cents, \
     is_lifetime, validity_days, is_active, created_at, updated_at";

/// Repository for SKU database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = SkuRepository::new(pool);
///
/// let sku = repo.get_by_id("uuid-here").await?;
/// let all = repo.list_active(50).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SkuRepository {
    pool: SqlitePool,
}

impl SkuRepository {
    /// Creates a new SkuRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SkuRepository { pool }
    }

    /// Gets a SKU by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Sku))` - SKU found
    /// * `Ok(None)` - SKU not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sku>> {
        let sku = sqlx::query_as::<_, Sku>(&format!(
            "SELECT {SKU_COLUMNS} FROM skus WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sku)
    }

    /// Gets a SKU by its business code (e.g. "PRO-1Y").
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Sku>> {
        let sku = sqlx::query_as::<_, Sku>(&format!(
            "SELECT {SKU_COLUMNS} FROM skus WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sku)
    }

    /// Lists active SKUs sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Sku>> {
        let skus = sqlx::query_as::<_, Sku>(&format!(
            "SELECT {SKU_COLUMNS} FROM skus WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(skus)
    }

    /// Inserts a new SKU.
    ///
    /// ## Returns
    /// * `Ok(Sku)` - Inserted SKU
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(&self, sku: &Sku) -> DbResult<Sku> {
        debug!(code = %sku.code, "Inserting SKU");

        sqlx::query(
            r#"
            INSERT INTO skus (
                id, product_id, code, name, price_cents,
                is_lifetime, validity_days, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sku.id)
        .bind(&sku.product_id)
        .bind(&sku.code)
        .bind(&sku.name)
        .bind(sku.price_cents)
        .bind(sku.is_lifetime)
        .bind(sku.validity_days)
        .bind(sku.is_active)
        .bind(sku.created_at)
        .bind(sku.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(sku.clone())
    }

    /// Soft-deletes a SKU by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Historical orders still reference this SKU
    /// - Sold licenses keep their provenance
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting SKU");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE skus
            SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sku", id));
        }

        Ok(())
    }

    /// Counts active SKUs (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skus WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new SKU ID.
pub fn generate_sku_id() -> String {
    Uuid::new_v4().to_string()
}
