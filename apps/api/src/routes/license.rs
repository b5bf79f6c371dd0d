//! License pool administration endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use keyfront_core::{validation, CoreError};
use keyfront_checkout::CheckoutError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for POST /skus/{id}/licenses.
#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub count: i64,
}

/// Response body for POST /skus/{id}/licenses.
#[derive(Debug, Serialize)]
pub struct CreateBatchResponse {
    pub sku_id: String,
    pub created: usize,
    pub license_ids: Vec<String>,
}

/// Response body for GET /skus/{id}/stock.
#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub sku_id: String,
    pub available: i64,
}

/// POST /skus/{id}/licenses - seed a batch of unsold licenses.
///
/// Administrative; sits behind the same trusted gateway as the rest of
/// the API. The batch size is capped so a typo cannot mint a few million
/// tokens.
pub async fn create_batch(
    State(state): State<AppState>,
    Path(sku_id): Path<String>,
    Json(req): Json<CreateBatchRequest>,
) -> ApiResult<(StatusCode, Json<CreateBatchResponse>)> {
    validation::validate_license_count(req.count).map_err(CoreError::from)?;

    let sku = state
        .db
        .skus()
        .get_by_id(&sku_id)
        .await?
        .ok_or_else(|| ApiError::Checkout(CheckoutError::SkuNotFound(sku_id.clone())))?;

    let created = state.db.licenses().create_batch(&sku, req.count).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBatchResponse {
            sku_id: sku.id,
            created: created.len(),
            license_ids: created.into_iter().map(|l| l.id).collect(),
        }),
    ))
}

/// GET /skus/{id}/stock - current unsold count (display only; checkout
/// never trusts this number).
pub async fn stock(
    State(state): State<AppState>,
    Path(sku_id): Path<String>,
) -> ApiResult<Json<StockResponse>> {
    let sku = state
        .db
        .skus()
        .get_by_id(&sku_id)
        .await?
        .ok_or_else(|| ApiError::Checkout(CheckoutError::SkuNotFound(sku_id.clone())))?;

    let available = state.db.licenses().available_count(&sku.id).await?;

    Ok(Json(StockResponse {
        sku_id: sku.id,
        available,
    }))
}
