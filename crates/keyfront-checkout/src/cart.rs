//! # Cart Service
//!
//! Validated cart mutations for one user.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cart Write Path                                     │
//! │                                                                         │
//! │  add_item(user, sku_id, qty)                                            │
//! │      │                                                                  │
//! │      ├── 1. validate inputs (keyfront-core::validation)                 │
//! │      ├── 2. resolve SKU from catalog - price/name frozen from here,     │
//! │      │      never from the client                                       │
//! │      ├── 3. load-or-create the active cart (lazy expiry inside)         │
//! │      ├── 4. apply the pure mutation (caps, accumulation, subtotal)      │
//! │      └── 5. persist the line; totals recomputed by SQL in the same      │
//! │             transaction                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Carts never touch the license pool: quantities are intentions, and
//! nothing is reserved until checkout.

use std::sync::Arc;
use tracing::debug;

use keyfront_core::{cart as cart_rules, validation, Cart, CoreError};
use keyfront_db::Database;

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};

/// Service for per-user cart operations.
#[derive(Clone)]
pub struct CartService {
    db: Arc<Database>,
    config: Arc<CheckoutConfig>,
}

impl CartService {
    /// Creates a new cart service.
    pub fn new(db: Arc<Database>, config: Arc<CheckoutConfig>) -> Self {
        CartService { db, config }
    }

    /// Returns the user's active cart, creating an empty one if needed.
    pub async fn get_cart(&self, user_id: &str) -> CheckoutResult<Cart> {
        validation::validate_user_id(user_id).map_err(CoreError::from)?;
        Ok(self
            .db
            .carts()
            .get_or_create(user_id, self.config.cart_ttl)
            .await?)
    }

    /// Adds a SKU to the user's cart, accumulating quantity onto an
    /// existing line for the same SKU.
    pub async fn add_item(&self, user_id: &str, sku_id: &str, quantity: i64) -> CheckoutResult<Cart> {
        validation::validate_user_id(user_id).map_err(CoreError::from)?;
        validation::validate_quantity(quantity).map_err(CoreError::from)?;

        let sku = self
            .db
            .skus()
            .get_by_id(sku_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| CheckoutError::SkuNotFound(sku_id.to_string()))?;

        let mut cart = self
            .db
            .carts()
            .get_or_create(user_id, self.config.cart_ttl)
            .await?;

        cart_rules::add_item(&mut cart, &sku, quantity)?;

        let line = cart
            .item(&sku.id)
            .cloned()
            .ok_or_else(|| CoreError::ItemNotInCart {
                sku_id: sku.id.clone(),
            })?;

        debug!(user_id = %user_id, sku_id = %sku_id, quantity, "Adding to cart");
        Ok(self
            .db
            .carts()
            .upsert_line(&cart.id, &line, self.config.cart_ttl)
            .await?)
    }

    /// Sets the quantity of an existing line; zero or negative removes it.
    pub async fn update_quantity(
        &self,
        user_id: &str,
        sku_id: &str,
        quantity: i64,
    ) -> CheckoutResult<Cart> {
        validation::validate_user_id(user_id).map_err(CoreError::from)?;

        let mut cart = self
            .db
            .carts()
            .get_or_create(user_id, self.config.cart_ttl)
            .await?;

        cart_rules::update_quantity(&mut cart, sku_id, quantity)?;

        match cart.item(sku_id) {
            Some(line) => Ok(self
                .db
                .carts()
                .upsert_line(&cart.id, &line.clone(), self.config.cart_ttl)
                .await?),
            None => Ok(self
                .db
                .carts()
                .remove_line(&cart.id, sku_id, self.config.cart_ttl)
                .await?),
        }
    }

    /// Removes a line from the user's cart.
    pub async fn remove_item(&self, user_id: &str, sku_id: &str) -> CheckoutResult<Cart> {
        validation::validate_user_id(user_id).map_err(CoreError::from)?;

        let mut cart = self
            .db
            .carts()
            .get_or_create(user_id, self.config.cart_ttl)
            .await?;

        cart_rules::remove_item(&mut cart, sku_id)?;

        Ok(self
            .db
            .carts()
            .remove_line(&cart.id, sku_id, self.config.cart_ttl)
            .await?)
    }

    /// Empties the user's cart, leaving it active.
    pub async fn clear(&self, user_id: &str) -> CheckoutResult<Cart> {
        validation::validate_user_id(user_id).map_err(CoreError::from)?;

        let cart = self
            .db
            .carts()
            .get_or_create(user_id, self.config.cart_ttl)
            .await?;

        Ok(self.db.carts().clear(&cart.id, self.config.cart_ttl).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keyfront_core::Sku;
    use keyfront_db::DbConfig;

    async fn setup() -> (CartService, Arc<Database>) {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let config = Arc::new(CheckoutConfig::default());

        for (id, code, price) in [
            ("sku-a", "BASIC-30D", 1000),
            ("sku-b", "PRO-1Y", 2500),
        ] {
            let now = Utc::now();
            db.skus()
                .insert(&Sku {
                    id: id.to_string(),
                    product_id: "prod-1".to_string(),
                    code: code.to_string(),
                    name: code.to_string(),
                    price_cents: price,
                    is_lifetime: false,
                    validity_days: Some(365),
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        (CartService::new(db.clone(), config), db)
    }

    #[tokio::test]
    async fn test_add_item_freezes_catalog_price() {
        let (service, _db) = setup().await;

        let cart = service.add_item("user-1", "sku-a", 2).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].price_cents, 1000);
        assert_eq!(cart.total_amount_cents, 2000);
        assert_eq!(cart.total_items, 2);
    }

    #[tokio::test]
    async fn test_re_adding_same_sku_accumulates() {
        let (service, _db) = setup().await;

        service.add_item("user-1", "sku-a", 2).await.unwrap();
        let cart = service.add_item("user-1", "sku-a", 3).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.total_amount_cents, 5000);
    }

    #[tokio::test]
    async fn test_two_skus_totals() {
        let (service, _db) = setup().await;

        service.add_item("user-1", "sku-a", 2).await.unwrap();
        let cart = service.add_item("user-1", "sku-b", 1).await.unwrap();

        assert_eq!(cart.total_amount_cents, 4500);
        assert_eq!(cart.total_items, 3);
    }

    #[tokio::test]
    async fn test_unknown_sku_rejected() {
        let (service, _db) = setup().await;

        let err = service.add_item("user-1", "ghost", 1).await.unwrap_err();
        assert!(matches!(err, CheckoutError::SkuNotFound(_)));
    }

    #[tokio::test]
    async fn test_inactive_sku_rejected() {
        let (service, db) = setup().await;
        db.skus().soft_delete("sku-a").await.unwrap();

        let err = service.add_item("user-1", "sku-a", 1).await.unwrap_err();
        assert!(matches!(err, CheckoutError::SkuNotFound(_)));
    }

    #[tokio::test]
    async fn test_zero_quantity_on_add_rejected() {
        let (service, _db) = setup().await;

        let err = service.add_item("user-1", "sku-a", 0).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Core(_)));
    }

    #[tokio::test]
    async fn test_update_quantity_to_zero_removes_line() {
        let (service, _db) = setup().await;

        service.add_item("user-1", "sku-a", 2).await.unwrap();
        service.add_item("user-1", "sku-b", 1).await.unwrap();

        let cart = service.update_quantity("user-1", "sku-a", 0).await.unwrap();
        assert!(cart.item("sku-a").is_none());
        assert_eq!(cart.total_amount_cents, 2500);
        assert_eq!(cart.total_items, 1);
    }

    #[tokio::test]
    async fn test_update_missing_line_fails() {
        let (service, _db) = setup().await;

        let err = service
            .update_quantity("user-1", "sku-a", 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Core(CoreError::ItemNotInCart { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (service, _db) = setup().await;

        service.add_item("user-1", "sku-a", 2).await.unwrap();
        service.add_item("user-1", "sku-b", 1).await.unwrap();

        let cart = service.remove_item("user-1", "sku-a").await.unwrap();
        assert_eq!(cart.items.len(), 1);

        let cart = service.clear("user-1").await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_amount_cents, 0);
    }

    #[tokio::test]
    async fn test_carts_are_isolated_per_user() {
        let (service, _db) = setup().await;

        service.add_item("user-1", "sku-a", 2).await.unwrap();
        let other = service.get_cart("user-2").await.unwrap();

        assert!(other.is_empty());
    }
}
