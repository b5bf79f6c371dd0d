//! HTTP-level tests: routing, the identity header, status mapping and
//! response shapes, driven through the router with `tower::ServiceExt`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use keyfront_api::{router, AppState};
use keyfront_checkout::CheckoutConfig;
use keyfront_core::Sku;
use keyfront_db::{Database, DbConfig};

struct TestApp {
    app: Router,
    db: Arc<Database>,
}

async fn test_app() -> TestApp {
    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    let state = AppState::new(db.clone(), Arc::new(CheckoutConfig::default()));
    TestApp {
        app: router(state),
        db,
    }
}

impl TestApp {
    async fn seed_sku(&self, id: &str, code: &str, price_cents: i64, stock: i64) {
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
    }

    async fn request(&self, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[tokio::test]
async fn health_endpoint() {
    let t = test_app().await;
    let (status, _) = t.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_user_header_is_rejected() {
    let t = test_app().await;
    let (status, body) = t
        .request(
            "POST",
            "/cart/items",
            None,
            Some(json!({"sku_id": "sku-1", "quantity": 1})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn add_item_returns_cart_summary() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 0).await;

    let (status, body) = t
        .request(
            "POST",
            "/cart/items",
            Some("user-1"),
            Some(json!({"sku_id": "sku-1", "quantity": 2})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_amount_cents"], 2000);
    assert_eq!(body["total_items"], 2);
    assert_eq!(body["items"][0]["sku_id"], "sku-1");
    assert_eq!(body["items"][0]["price_cents"], 1000);
}

#[tokio::test]
async fn unknown_sku_is_404() {
    let t = test_app().await;

    let (status, body) = t
        .request(
            "POST",
            "/cart/items",
            Some("user-1"),
            Some(json!({"sku_id": "ghost", "quantity": 1})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn invalid_quantity_is_400() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 0).await;

    let (status, body) = t
        .request(
            "POST",
            "/cart/items",
            Some("user-1"),
            Some(json!({"sku_id": "sku-1", "quantity": 0})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn patch_to_zero_removes_line() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 0).await;
    t.seed_sku("sku-2", "PRO-1Y", 2500, 0).await;

    t.request(
        "POST",
        "/cart/items",
        Some("user-1"),
        Some(json!({"sku_id": "sku-1", "quantity": 2})),
    )
    .await;
    t.request(
        "POST",
        "/cart/items",
        Some("user-1"),
        Some(json!({"sku_id": "sku-2", "quantity": 1})),
    )
    .await;

    let (status, body) = t
        .request(
            "PATCH",
            "/cart/items/sku-1",
            Some("user-1"),
            Some(json!({"quantity": 0})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_amount_cents"], 2500);
    assert_eq!(body["total_items"], 1);
}

#[tokio::test]
async fn patch_missing_line_is_404() {
    let t = test_app().await;

    let (status, body) = t
        .request(
            "PATCH",
            "/cart/items/ghost",
            Some("user-1"),
            Some(json!({"quantity": 2})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn delete_line_and_clear_cart() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 0).await;

    t.request(
        "POST",
        "/cart/items",
        Some("user-1"),
        Some(json!({"sku_id": "sku-1", "quantity": 2})),
    )
    .await;

    let (status, body) = t
        .request("DELETE", "/cart/items/sku-1", Some("user-1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_items"], 0);

    let (status, body) = t.request("DELETE", "/cart", Some("user-1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn checkout_empty_cart_is_400() {
    let t = test_app().await;

    let (status, body) = t.request("POST", "/checkout", Some("user-1"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "empty_cart");
}

#[tokio::test]
async fn checkout_insufficient_stock_is_409_with_sku() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 1).await;

    t.request(
        "POST",
        "/cart/items",
        Some("user-1"),
        Some(json!({"sku_id": "sku-1", "quantity": 2})),
    )
    .await;

    let (status, body) = t.request("POST", "/checkout", Some("user-1"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "insufficient_stock");
    assert_eq!(body["error"]["sku_id"], "sku-1");
    assert_eq!(body["error"]["available"], 1);
}

#[tokio::test]
async fn license_batch_and_stock_endpoints() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 0).await;

    let (status, body) = t
        .request(
            "POST",
            "/skus/sku-1/licenses",
            Some("admin"),
            Some(json!({"count": 15})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], 15);
    assert_eq!(body["license_ids"].as_array().unwrap().len(), 15);

    let (status, body) = t
        .request("GET", "/skus/sku-1/stock", Some("user-1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 15);
}

#[tokio::test]
async fn license_batch_count_is_capped() {
    let t = test_app().await;
    t.seed_sku("sku-1", "BASIC-30D", 1000, 0).await;

    let (status, body) = t
        .request(
            "POST",
            "/skus/sku-1/licenses",
            Some("admin"),
            Some(json!({"count": 10_001})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_argument");
}

#[tokio::test]
async fn full_purchase_flow() {
    let t = test_app().await;
    t.seed_sku("sku-a", "BASIC-30D", 1000, 5).await;
    t.seed_sku("sku-b", "PRO-1Y", 2500, 5).await;

    t.request(
        "POST",
        "/cart/items",
        Some("user-1"),
        Some(json!({"sku_id": "sku-a", "quantity": 2})),
    )
    .await;
    t.request(
        "POST",
        "/cart/items",
        Some("user-1"),
        Some(json!({"sku_id": "sku-b", "quantity": 1})),
    )
    .await;

    let (status, body) = t.request("POST", "/checkout", Some("user-1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_amount_cents"], 4500);
    assert_eq!(body["total_items"], 3);
    assert!(!body["order_id"].as_str().unwrap().is_empty());

    let licenses = body["licenses"].as_array().unwrap();
    assert_eq!(licenses.len(), 3);
    assert!(licenses.iter().all(|l| !l["token"].as_str().unwrap().is_empty()));

    // Stock reflects the sale.
    let (_, body) = t
        .request("GET", "/skus/sku-a/stock", Some("user-1"), None)
        .await;
    assert_eq!(body["available"], 3);

    // The cart is fresh afterwards.
    let (_, body) = t.request("GET", "/cart", Some("user-1"), None).await;
    assert_eq!(body["total_items"], 0);
}
