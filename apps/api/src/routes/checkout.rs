//! Checkout endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use keyfront_checkout::IssuedLicense;

use crate::error::ApiResult;
use crate::state::{AppState, UserId};

/// Response body for POST /checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub total_amount_cents: i64,
    pub total_items: i64,
    pub licenses: Vec<IssuedLicense>,
}

/// POST /checkout - convert the active cart into an order.
///
/// On success the response carries the license tokens the buyer paid for.
/// On any failure the cart is untouched and nothing is reserved; a 409
/// means the pool genuinely ran out, a 503 means retry the same request.
pub async fn checkout(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<CheckoutResponse>> {
    let receipt = state.checkout.checkout(&user_id).await?;

    Ok(Json(CheckoutResponse {
        order_id: receipt.order.id,
        total_amount_cents: receipt.order.total_amount_cents,
        total_items: receipt.order.total_items,
        licenses: receipt.licenses,
    }))
}
