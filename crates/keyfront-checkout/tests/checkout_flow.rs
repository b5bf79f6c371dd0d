//! End-to-end checkout behavior against a real (temp-file) database.
//!
//! File-backed databases get a real connection pool, so the concurrency
//! tests here exercise actual writer contention, not a single serialized
//! connection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use keyfront_checkout::{
    CartService, CheckoutConfig, CheckoutError, CheckoutOrchestrator, LicenseAllocator,
    NoOpObserver,
};
use keyfront_core::{CartStatus, LicenseStatus, Sku};
use keyfront_db::{Database, DbConfig};

struct Harness {
    _dir: TempDir,
    db: Arc<Database>,
    config: Arc<CheckoutConfig>,
    carts: CartService,
    checkout: CheckoutOrchestrator,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_config = DbConfig::new(dir.path().join("keyfront.db")).max_connections(5);
        let db = Arc::new(Database::new(db_config).await.unwrap());

        let config = Arc::new(CheckoutConfig::default());
        let carts = CartService::new(db.clone(), config.clone());
        let checkout = CheckoutOrchestrator::new(db.clone(), config.clone(), Arc::new(NoOpObserver));

        Harness {
            _dir: dir,
            db,
            config,
            carts,
            checkout,
        }
    }

    async fn seed_sku(&self, id: &str, code: &str, price_cents: i64, stock: i64) -> Sku {
        let now = Utc::now();
        let sku = Sku {
            id: id.to_string(),
            product_id: format!("prod-{}", id),
            code: code.to_string(),
            name: code.to_string(),
            price_cents,
            is_lifetime: false,
            validity_days: Some(365),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.db.skus().insert(&sku).await.unwrap();
        if stock > 0 {
            self.db.licenses().create_batch(&sku, stock).await.unwrap();
        }
        sku
    }

    async fn available(&self, sku_id: &str) -> i64 {
        self.db.licenses().available_count(sku_id).await.unwrap()
    }
}

#[tokio::test]
async fn checkout_happy_path() {
    let h = Harness::new().await;
    h.seed_sku("sku-a", "BASIC-30D", 1000, 5).await;
    h.seed_sku("sku-b", "PRO-1Y", 2500, 5).await;

    h.carts.add_item("user-1", "sku-a", 2).await.unwrap();
    h.carts.add_item("user-1", "sku-b", 1).await.unwrap();

    let receipt = h.checkout.checkout("user-1").await.unwrap();

    assert_eq!(receipt.order.total_amount_cents, 4500);
    assert_eq!(receipt.order.total_items, 3);
    assert_eq!(receipt.licenses.len(), 3);
    assert_eq!(
        receipt.licenses.iter().filter(|l| l.sku_id == "sku-a").count(),
        2
    );

    // Stock reflects the sale.
    assert_eq!(h.available("sku-a").await, 3);
    assert_eq!(h.available("sku-b").await, 4);

    // Order items were frozen from the cart.
    let items = h.db.orders().items(&receipt.order.id).await.unwrap();
    assert_eq!(items.len(), 2);

    // Every issued license is sold and stamped with the order.
    for sku_id in ["sku-a", "sku-b"] {
        let sold = h
            .db
            .licenses()
            .list_for_sku(sku_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|l| l.status == LicenseStatus::Sold)
            .collect::<Vec<_>>();
        assert!(sold.iter().all(|l| l.order_id.as_deref() == Some(receipt.order.id.as_str())));
    }

    // The cart was converted and the next add starts a fresh one.
    let fresh = h.carts.get_cart("user-1").await.unwrap();
    assert!(fresh.is_empty());
    assert_eq!(fresh.status, CartStatus::Active);
}

#[tokio::test]
async fn empty_cart_fails_fast() {
    let h = Harness::new().await;
    h.seed_sku("sku-a", "BASIC-30D", 1000, 5).await;

    // No cart at all.
    let err = h.checkout.checkout("user-1").await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    // An existing but empty cart.
    h.carts.get_cart("user-1").await.unwrap();
    let err = h.checkout.checkout("user-1").await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    assert_eq!(h.available("sku-a").await, 5);
}

#[tokio::test]
async fn failed_line_releases_earlier_claims() {
    let h = Harness::new().await;
    h.seed_sku("sku-a", "BASIC-30D", 1000, 5).await;
    h.seed_sku("sku-b", "PRO-1Y", 2500, 1).await;

    h.carts.add_item("user-1", "sku-a", 2).await.unwrap();
    h.carts.add_item("user-1", "sku-b", 3).await.unwrap(); // only 1 in stock

    let err = h.checkout.checkout("user-1").await.unwrap_err();
    match err {
        CheckoutError::InsufficientStock {
            sku_id,
            requested,
            available,
        } => {
            assert_eq!(sku_id, "sku-b");
            assert_eq!(requested, 3);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // The claims on sku-a were rolled back; nothing is held anywhere.
    assert_eq!(h.available("sku-a").await, 5);
    assert_eq!(h.available("sku-b").await, 1);

    // The cart is unchanged and still active.
    let cart = h.carts.get_cart("user-1").await.unwrap();
    assert_eq!(cart.status, CartStatus::Active);
    assert_eq!(cart.total_items, 5);
    assert_eq!(cart.total_amount_cents, 9500);

    // No order row was left behind.
    assert!(h
        .db
        .orders()
        .list_for_user("user-1", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_checkout_can_be_retried_after_restock() {
    let h = Harness::new().await;
    let sku = h.seed_sku("sku-a", "BASIC-30D", 1000, 1).await;

    h.carts.add_item("user-1", "sku-a", 2).await.unwrap();
    let err = h.checkout.checkout("user-1").await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));

    h.db.licenses().create_batch(&sku, 1).await.unwrap();
    let receipt = h.checkout.checkout("user-1").await.unwrap();
    assert_eq!(receipt.licenses.len(), 2);
    assert_eq!(h.available("sku-a").await, 0);
}

#[tokio::test]
async fn two_checkouts_race_for_last_unit() {
    let h = Harness::new().await;
    h.seed_sku("sku-a", "BASIC-30D", 1000, 1).await;

    h.carts.add_item("user-1", "sku-a", 1).await.unwrap();
    h.carts.add_item("user-2", "sku-a", 1).await.unwrap();

    let c1 = {
        let checkout = h.checkout.clone();
        tokio::spawn(async move { checkout.checkout("user-1").await })
    };
    let c2 = {
        let checkout = h.checkout.clone();
        tokio::spawn(async move { checkout.checkout("user-2").await })
    };

    let results = [c1.await.unwrap(), c2.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(successes, 1, "exactly one checkout wins the last unit");
    for r in &results {
        if let Err(e) = r {
            assert!(
                matches!(e, CheckoutError::InsufficientStock { .. }) || e.is_transient(),
                "loser saw unexpected error: {:?}",
                e
            );
        }
    }

    // Exactly one license sold, zero claimed.
    assert_eq!(h.available("sku-a").await, 0);
    let licenses = h.db.licenses().list_for_sku("sku-a").await.unwrap();
    assert_eq!(
        licenses
            .iter()
            .filter(|l| l.status == LicenseStatus::Sold)
            .count(),
        1
    );
    assert!(licenses.iter().all(|l| l.status != LicenseStatus::Claimed));
}

#[tokio::test]
async fn concurrent_claims_never_oversell() {
    let h = Harness::new().await;
    let sku = h.seed_sku("sku-a", "BASIC-30D", 1000, 5).await;

    let allocator = LicenseAllocator::new(h.db.clone(), h.config.clone());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let allocator = allocator.clone();
        let sku_id = sku.id.clone();
        tasks.push(tokio::spawn(async move {
            allocator.claim(&sku_id, 1, &format!("attempt-{}", i)).await
        }));
    }

    let mut claimed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(licenses) => claimed += licenses.len(),
            Err(CheckoutError::InsufficientStock { .. }) => {}
            Err(e) => assert!(e.is_transient(), "unexpected error: {:?}", e),
        }
    }

    assert_eq!(claimed, 5, "every unit claimed exactly once");
    assert_eq!(h.available("sku-a").await, 0);

    let licenses = h.db.licenses().list_for_sku(&sku.id).await.unwrap();
    assert_eq!(
        licenses
            .iter()
            .filter(|l| l.status == LicenseStatus::Claimed)
            .count(),
        5
    );
}

#[tokio::test]
async fn timed_out_checkout_leaves_no_trace() {
    let h = Harness::new().await;
    h.seed_sku("sku-a", "BASIC-30D", 1000, 5).await;
    h.carts.add_item("user-1", "sku-a", 2).await.unwrap();

    // A deadline too short to finish anything.
    let config = Arc::new(
        CheckoutConfig::default()
            .checkout_timeout(Duration::from_nanos(1))
            .claim_ttl(Duration::from_secs(180)),
    );
    let checkout = CheckoutOrchestrator::new(h.db.clone(), config, Arc::new(NoOpObserver));

    let err = checkout.checkout("user-1").await.unwrap_err();
    assert!(matches!(err, CheckoutError::Timeout(_)));

    // Compensation (plus the reaper as backstop) means nothing is held.
    assert_eq!(h.available("sku-a").await, 5);
    assert!(h
        .db
        .orders()
        .list_for_user("user-1", 10)
        .await
        .unwrap()
        .is_empty());

    let cart = h.carts.get_cart("user-1").await.unwrap();
    assert_eq!(cart.status, CartStatus::Active);
    assert_eq!(cart.total_items, 2);

    // The real deadline still allows the retry to succeed.
    let receipt = h.checkout.checkout("user-1").await.unwrap();
    assert_eq!(receipt.licenses.len(), 2);
}
