//! Cart endpoints.
//!
//! Every mutation returns the full cart summary so the storefront can
//! re-render without a second round trip. Totals in the response are the
//! recomputed values from the same transaction as the mutation.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use keyfront_core::Cart;

use crate::error::ApiResult;
use crate::state::{AppState, UserId};

/// Request body for POST /cart/items.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub sku_id: String,
    pub quantity: i64,
}

/// Request body for PATCH /cart/items/{sku_id}.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// GET /cart - the user's active cart (created empty if none).
pub async fn get_cart(State(state): State<AppState>, UserId(user_id): UserId) -> ApiResult<Json<Cart>> {
    let cart = state.carts.get_cart(&user_id).await?;
    Ok(Json(cart))
}

/// POST /cart/items - add a SKU, accumulating onto an existing line.
pub async fn add_item(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<Json<Cart>> {
    let cart = state
        .carts
        .add_item(&user_id, &req.sku_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// PATCH /cart/items/{sku_id} - set a line's quantity; zero removes it.
pub async fn update_item(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(sku_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<Json<Cart>> {
    let cart = state
        .carts
        .update_quantity(&user_id, &sku_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{sku_id} - drop a line.
pub async fn remove_item(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(sku_id): Path<String>,
) -> ApiResult<Json<Cart>> {
    let cart = state.carts.remove_item(&user_id, &sku_id).await?;
    Ok(Json(cart))
}

/// DELETE /cart - empty the cart, keeping it active.
pub async fn clear_cart(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Cart>> {
    let cart = state.carts.clear(&user_id).await?;
    Ok(Json(cart))
}
