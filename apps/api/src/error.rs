//! API error type and the error → HTTP status mapping.
//!
//! ## Status Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error → Status Mapping                                │
//! │                                                                         │
//! │  400  invalid input, empty cart        (the request itself is wrong)    │
//! │  404  unknown SKU, line not in cart    (the thing isn't there)          │
//! │  409  insufficient stock, state clash  (correct request, lost the race) │
//! │  503  transient conflict, timeout      (try the same request again)     │
//! │  500  everything else                  (our fault)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A 409 for stock is final for the current pool; a 503 is an invitation
//! to retry unchanged. The body always carries a machine-readable `code`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use keyfront_core::CoreError;
use keyfront_checkout::CheckoutError;
use keyfront_db::DbError;

/// API-level errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The x-user-id header is missing or empty.
    #[error("Missing or empty x-user-id header")]
    MissingUserHeader,

    /// Anything the engine reported.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Checkout(CheckoutError::Core(err))
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Checkout(CheckoutError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, extra) = match &self {
            ApiError::MissingUserHeader => {
                (StatusCode::BAD_REQUEST, "invalid_argument", None)
            }

            ApiError::Checkout(err) => match err {
                CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart", None),

                CheckoutError::SkuNotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),

                CheckoutError::InsufficientStock {
                    sku_id,
                    requested,
                    available,
                } => (
                    StatusCode::CONFLICT,
                    "insufficient_stock",
                    Some(json!({
                        "sku_id": sku_id,
                        "requested": requested,
                        "available": available,
                    })),
                ),

                CheckoutError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state", None),

                CheckoutError::Conflict(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "transient_conflict", None)
                }
                CheckoutError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "timeout", None),

                CheckoutError::Core(core) => match core {
                    CoreError::SkuNotFound(_)
                    | CoreError::LicenseNotFound(_)
                    | CoreError::ItemNotInCart { .. } => {
                        (StatusCode::NOT_FOUND, "not_found", None)
                    }
                    CoreError::InsufficientStock { .. } => {
                        (StatusCode::CONFLICT, "insufficient_stock", None)
                    }
                    CoreError::InvalidLicenseState { .. } => {
                        (StatusCode::CONFLICT, "invalid_state", None)
                    }
                    CoreError::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart", None),
                    CoreError::CartTooLarge { .. }
                    | CoreError::QuantityTooLarge { .. }
                    | CoreError::Validation(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_argument", None)
                    }
                },

                CheckoutError::Db(DbError::NotFound { .. }) => {
                    (StatusCode::NOT_FOUND, "not_found", None)
                }
                CheckoutError::Db(db_err) => {
                    error!(error = %db_err, "Unhandled database error in request");
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal", None)
                }
            },
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });
        if let (Some(extra), Some(obj)) = (extra, body["error"].as_object_mut()) {
            if let Some(extra_obj) = extra.as_object() {
                for (k, v) in extra_obj {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
