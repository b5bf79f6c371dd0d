//! HTTP route handlers.
//!
//! ## Route Map
//! ```text
//! GET    /health                   liveness + database reachability
//! GET    /cart                     current cart summary
//! POST   /cart/items               add a SKU (accumulates quantity)
//! PATCH  /cart/items/{sku_id}      set line quantity (0 removes)
//! DELETE /cart/items/{sku_id}      remove a line
//! DELETE /cart                     clear the cart
//! POST   /checkout                 convert the cart into an order
//! POST   /skus/{id}/licenses       admin: seed a license batch
//! GET    /skus/{id}/stock          available (unsold) license count
//! ```

pub mod cart;
pub mod checkout;
pub mod license;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{sku_id}",
            axum::routing::patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/checkout", post(checkout::checkout))
        .route("/skus/{id}/licenses", post(license::create_batch))
        .route("/skus/{id}/stock", get(license::stock))
        .with_state(state)
}

/// Liveness probe: verifies the database answers a trivial query.
async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::http::StatusCode {
    if state.db.health_check().await {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}
