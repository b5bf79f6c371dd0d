//! API server configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults, suitable for containerized deployment.

use std::env;
use std::time::Duration;

use thiserror::Error;

use keyfront_checkout::CheckoutConfig;

/// Configuration load errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP listen port.
    pub port: u16,

    /// Path to the SQLite database file.
    pub database_path: String,

    /// Checkout/allocation timing knobs.
    pub checkout: CheckoutConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// ## Variables
    /// - `API_PORT` (default 8080)
    /// - `DATABASE_PATH` (default ./keyfront.db)
    /// - `CHECKOUT_TIMEOUT_SECS` (default 30)
    /// - `CLAIM_TTL_SECS` (default 6x the checkout timeout)
    /// - `REAPER_INTERVAL_SECS` (default 60)
    /// - `CART_TTL_SECS` (default 86400)
    /// - `MAX_CLAIM_RETRIES` (default 3)
    pub fn load() -> Result<Self, ConfigError> {
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("API_PORT".to_string()))?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./keyfront.db".to_string());

        let mut checkout = CheckoutConfig::default();

        if let Ok(secs) = env::var("CHECKOUT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CHECKOUT_TIMEOUT_SECS".to_string()))?;
            checkout = checkout.checkout_timeout(Duration::from_secs(secs));
        }

        if let Ok(secs) = env::var("CLAIM_TTL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CLAIM_TTL_SECS".to_string()))?;
            checkout = checkout.claim_ttl(Duration::from_secs(secs));
        }

        if let Ok(secs) = env::var("REAPER_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REAPER_INTERVAL_SECS".to_string()))?;
            checkout = checkout.reaper_interval(Duration::from_secs(secs));
        }

        if let Ok(secs) = env::var("CART_TTL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CART_TTL_SECS".to_string()))?;
            checkout = checkout.cart_ttl(Duration::from_secs(secs));
        }

        if let Ok(retries) = env::var("MAX_CLAIM_RETRIES") {
            let retries: u32 = retries
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MAX_CLAIM_RETRIES".to_string()))?;
            checkout = checkout.max_claim_retries(retries);
        }

        checkout
            .validate()
            .map_err(ConfigError::InvalidValue)?;

        Ok(ApiConfig {
            port,
            database_path,
            checkout,
        })
    }
}
