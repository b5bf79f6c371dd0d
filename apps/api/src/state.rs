//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use keyfront_checkout::{CartService, CheckoutConfig, CheckoutOrchestrator, NoOpObserver};
use keyfront_db::Database;

use crate::error::ApiError;

/// Shared state: the database plus the engine services built over it.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub carts: CartService,
    pub checkout: CheckoutOrchestrator,
}

impl AppState {
    /// Wires the engine services over one database handle.
    pub fn new(db: Arc<Database>, config: Arc<CheckoutConfig>) -> Self {
        let carts = CartService::new(db.clone(), config.clone());
        let checkout = CheckoutOrchestrator::new(db.clone(), config, Arc::new(NoOpObserver));

        AppState { db, carts, checkout }
    }
}

/// The caller's identity, taken from the `x-user-id` header.
///
/// Authentication itself belongs to the auth collaborator in front of this
/// service; the header value is trusted but must be present and non-empty.
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match value {
            Some(user_id) => Ok(UserId(user_id.to_string())),
            None => Err(ApiError::MissingUserHeader),
        }
    }
}
