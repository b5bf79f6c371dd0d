//! # Cart Repository
//!
//! Database operations for per-user shopping carts.
//!
//! ## Division of Labor
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Write Path                                       │
//! │                                                                         │
//! │  API handler                                                            │
//! │    │  1. cart = repo.get_or_create(user)      (lazy expiry here)        │
//! │    │  2. keyfront_core::cart::add_item(...)   (caps, accumulation,      │
//! │    │                                           subtotal math)           │
//! │    │  3. repo.upsert_line(cart.id, &line)     (persist + SQL-SUM        │
//! │    ▼                                           totals in one txn)       │
//! │  CartRepository                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Domain rules live in keyfront-core; this module only persists the result
//! and keeps the stored totals authoritative: after every mutation the
//! cart's `total_amount_cents` / `total_items` are recomputed from the line
//! rows by SQL aggregation inside the same transaction, never adjusted
//! incrementally.
//!
//! ## One Active Cart Per User
//! Enforced by a partial unique index on `carts(user_id) WHERE status =
//! 'active'`. `get_or_create` is the only creator, and it abandons an
//! expired cart before inserting a fresh one.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use keyfront_core::{Cart, CartItem, CartStatus};

/// Raw carts-table row; items are attached by the assemble step.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: String,
    user_id: String,
    status: CartStatus,
    total_amount_cents: i64,
    total_items: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self, items: Vec<CartItem>) -> Cart {
        Cart {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            items,
            total_amount_cents: self.total_amount_cents,
            total_items: self.total_items,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        }
    }
}

const CART_COLUMNS: &str =
    "id, user_id, status, total_amount_cents, total_items, created_at, updated_at, expires_at";

const ITEM_COLUMNS: &str = "product_id, sku_id, name, price_cents, quantity, subtotal_cents";

// =============================================================================
// Cart Repository
// =============================================================================

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Returns the user's active cart, creating one if none exists.
    ///
    /// ## Lazy Expiry
    /// An active cart whose `expires_at` has passed is marked abandoned
    /// here, and a fresh cart is created in its place. There is no
    /// background sweep for carts - an expired cart holds no inventory, so
    /// nothing is lost by leaving it until the user comes back.
    pub async fn get_or_create(&self, user_id: &str, ttl: Duration) -> DbResult<Cart> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = ?1 AND status = 'active'"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            if row.expires_at > now {
                let items = load_items(&mut tx, &row.id).await?;
                tx.commit().await?;
                return Ok(row.into_cart(items));
            }

            info!(cart_id = %row.id, user_id = %user_id, "Abandoning expired cart");
            sqlx::query("UPDATE carts SET status = 'abandoned', updated_at = ?2 WHERE id = ?1")
                .bind(&row.id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: CartStatus::Active,
            items: Vec::new(),
            total_amount_cents: 0,
            total_items: 0,
            created_at: now,
            updated_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24)),
        };

        sqlx::query(
            r#"
            INSERT INTO carts (
                id, user_id, status, total_amount_cents, total_items,
                created_at, updated_at, expires_at
            ) VALUES (?1, ?2, 'active', 0, 0, ?3, ?4, ?5)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .bind(cart.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(cart_id = %cart.id, user_id = %user_id, "Created new cart");
        Ok(cart)
    }

    /// Returns the user's active cart without creating one.
    pub async fn get_active(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = ?1 AND status = 'active'"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut tx = self.pool.begin().await?;
                let items = load_items(&mut tx, &row.id).await?;
                tx.commit().await?;
                Ok(Some(row.into_cart(items)))
            }
            None => Ok(None),
        }
    }

    /// Gets a cart by ID regardless of status.
    pub async fn get_by_id(&self, cart_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"
        ))
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut tx = self.pool.begin().await?;
                let items = load_items(&mut tx, &row.id).await?;
                tx.commit().await?;
                Ok(Some(row.into_cart(items)))
            }
            None => Ok(None),
        }
    }

    /// Writes a line (insert or overwrite) and recomputes cart totals.
    ///
    /// The caller has already run the domain logic (caps, quantity
    /// accumulation, subtotal) in keyfront-core, so the stored quantity is
    /// set absolutely, not incremented. The UNIQUE(cart_id, sku_id) index
    /// plus the upsert keeps one row per SKU.
    pub async fn upsert_line(
        &self,
        cart_id: &str,
        item: &CartItem,
        ttl: Duration,
    ) -> DbResult<Cart> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (
                id, cart_id, product_id, sku_id, name,
                price_cents, quantity, subtotal_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (cart_id, sku_id) DO UPDATE SET
                quantity = excluded.quantity,
                subtotal_cents = excluded.subtotal_cents
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(cart_id)
        .bind(&item.product_id)
        .bind(&item.sku_id)
        .bind(&item.name)
        .bind(item.price_cents)
        .bind(item.quantity)
        .bind(item.subtotal_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let cart = finish_mutation(&mut tx, cart_id, now, ttl).await?;
        tx.commit().await?;

        debug!(
            cart_id = %cart_id,
            sku_id = %item.sku_id,
            quantity = item.quantity,
            total_cents = cart.total_amount_cents,
            "Cart line written"
        );
        Ok(cart)
    }

    /// Removes a line and recomputes cart totals.
    ///
    /// Missing-line is the caller's domain error; here a vanished row just
    /// means there is nothing to delete.
    pub async fn remove_line(&self, cart_id: &str, sku_id: &str, ttl: Duration) -> DbResult<Cart> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1 AND sku_id = ?2")
            .bind(cart_id)
            .bind(sku_id)
            .execute(&mut *tx)
            .await?;

        let cart = finish_mutation(&mut tx, cart_id, now, ttl).await?;
        tx.commit().await?;

        debug!(cart_id = %cart_id, sku_id = %sku_id, "Cart line removed");
        Ok(cart)
    }

    /// Removes every line, leaving an empty active cart.
    pub async fn clear(&self, cart_id: &str, ttl: Duration) -> DbResult<Cart> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        let cart = finish_mutation(&mut tx, cart_id, now, ttl).await?;
        tx.commit().await?;

        info!(cart_id = %cart_id, "Cart cleared");
        Ok(cart)
    }

    /// Marks an active cart converted after a successful checkout.
    ///
    /// Guarded on `status = 'active'`: converting a cart that already left
    /// the active state is an error, never a silent overwrite.
    pub async fn mark_converted(&self, cart_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE carts SET status = 'converted', updated_at = ?2 \
             WHERE id = ?1 AND status = 'active'",
        )
        .bind(cart_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Active cart", cart_id));
        }

        info!(cart_id = %cart_id, "Cart converted");
        Ok(())
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Loads the line items of a cart, in insertion order.
async fn load_items(tx: &mut Transaction<'_, Sqlite>, cart_id: &str) -> DbResult<Vec<CartItem>> {
    let items = sqlx::query_as::<_, CartItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 ORDER BY created_at, rowid"
    ))
    .bind(cart_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(items)
}

/// Recomputes totals from the line rows, refreshes the idle deadline, and
/// returns the assembled cart. Runs inside the caller's transaction so the
/// totals can never be observed out of sync with the lines.
async fn finish_mutation(
    tx: &mut Transaction<'_, Sqlite>,
    cart_id: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> DbResult<Cart> {
    let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));

    let result = sqlx::query(
        r#"
        UPDATE carts SET
            total_amount_cents = COALESCE(
                (SELECT SUM(subtotal_cents) FROM cart_items WHERE cart_id = ?1), 0),
            total_items = COALESCE(
                (SELECT SUM(quantity) FROM cart_items WHERE cart_id = ?1), 0),
            updated_at = ?2,
            expires_at = ?3
        WHERE id = ?1 AND status = 'active'
        "#,
    )
    .bind(cart_id)
    .bind(now)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Active cart", cart_id));
    }

    let row = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"
    ))
    .bind(cart_id)
    .fetch_one(&mut **tx)
    .await?;

    let items = load_items(tx, cart_id).await?;
    Ok(row.into_cart(items))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    const TTL: Duration = Duration::from_secs(3600);

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn line(sku_id: &str, price_cents: i64, quantity: i64) -> CartItem {
        CartItem {
            product_id: "prod-1".to_string(),
            sku_id: sku_id.to_string(),
            name: format!("SKU {}", sku_id),
            price_cents,
            quantity,
            subtotal_cents: price_cents * quantity,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_active_cart() {
        let db = test_db().await;
        let repo = db.carts();

        let first = repo.get_or_create("user-1", TTL).await.unwrap();
        let second = repo.get_or_create("user-1", TTL).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, CartStatus::Active);
    }

    #[tokio::test]
    async fn test_carts_are_per_user() {
        let db = test_db().await;
        let repo = db.carts();

        let a = repo.get_or_create("user-a", TTL).await.unwrap();
        let b = repo.get_or_create("user-b", TTL).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_upsert_line_overwrites_and_recomputes_totals() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("user-1", TTL).await.unwrap();

        let cart = repo.upsert_line(&cart.id, &line("sku-1", 1000, 2), TTL).await.unwrap();
        assert_eq!(cart.total_amount_cents, 2000);
        assert_eq!(cart.total_items, 2);

        // Same SKU again with the final quantity, as the domain layer sends it.
        let cart = repo.upsert_line(&cart.id, &line("sku-1", 1000, 5), TTL).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_amount_cents, 5000);
        assert_eq!(cart.total_items, 5);
    }

    #[tokio::test]
    async fn test_totals_across_multiple_skus() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("user-1", TTL).await.unwrap();

        repo.upsert_line(&cart.id, &line("sku-1", 1000, 2), TTL).await.unwrap();
        let cart = repo.upsert_line(&cart.id, &line("sku-2", 2500, 1), TTL).await.unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_amount_cents, 4500);
        assert_eq!(cart.total_items, 3);
    }

    #[tokio::test]
    async fn test_remove_line_recomputes_totals() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("user-1", TTL).await.unwrap();

        repo.upsert_line(&cart.id, &line("sku-1", 1000, 2), TTL).await.unwrap();
        repo.upsert_line(&cart.id, &line("sku-2", 2500, 1), TTL).await.unwrap();

        let cart = repo.remove_line(&cart.id, "sku-1", TTL).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_amount_cents, 2500);
        assert_eq!(cart.total_items, 1);
    }

    #[tokio::test]
    async fn test_clear_leaves_empty_active_cart() {
        let db = test_db().await;
        let repo = db.carts();
        let cart = repo.get_or_create("user-1", TTL).await.unwrap();

        repo.upsert_line(&cart.id, &line("sku-1", 1000, 2), TTL).await.unwrap();
        let cart = repo.clear(&cart.id, TTL).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.total_amount_cents, 0);
        assert_eq!(cart.total_items, 0);
        assert_eq!(cart.status, CartStatus::Active);
    }

    #[tokio::test]
    async fn test_converted_cart_is_replaced_by_fresh_one() {
        let db = test_db().await;
        let repo = db.carts();

        let cart = repo.get_or_create("user-1", TTL).await.unwrap();
        repo.mark_converted(&cart.id).await.unwrap();

        let fresh = repo.get_or_create("user-1", TTL).await.unwrap();
        assert_ne!(fresh.id, cart.id);
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn test_mark_converted_twice_fails() {
        let db = test_db().await;
        let repo = db.carts();

        let cart = repo.get_or_create("user-1", TTL).await.unwrap();
        repo.mark_converted(&cart.id).await.unwrap();

        let err = repo.mark_converted(&cart.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_expired_cart_is_abandoned_on_next_access() {
        let db = test_db().await;
        let repo = db.carts();

        let cart = repo
            .get_or_create("user-1", Duration::from_secs(0))
            .await
            .unwrap();

        // Zero TTL means the cart is already past its deadline.
        let fresh = repo.get_or_create("user-1", TTL).await.unwrap();
        assert_ne!(fresh.id, cart.id);

        let old = repo.get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(old.status, CartStatus::Abandoned);
    }
}
