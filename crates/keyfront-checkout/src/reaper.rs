//! # Claim Reaper
//!
//! Background task that returns orphaned claims to the pool.
//!
//! ## Reaper Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Claim Reaper Flow                                  │
//! │                                                                         │
//! │  every reaper_interval:                                                 │
//! │                                                                         │
//! │  1. cutoff = now - claim_ttl                                            │
//! │                                                                         │
//! │  2. UPDATE licenses                                                     │
//! │     SET status = 'unsold', claimed_by = NULL, claimed_at = NULL         │
//! │     WHERE status = 'claimed' AND claimed_at < cutoff                    │
//! │                                                                         │
//! │  One statement, guarded on status: a claim that a concurrent checkout   │
//! │  just committed is already 'sold' and cannot be swept. claim_ttl is     │
//! │  several multiples of checkout_timeout, so a claim old enough to sweep  │
//! │  belongs to a checkout that is long dead (crashed process, dropped      │
//! │  task) - not to one that is merely slow.                                │
//! │                                                                         │
//! │  Carts have no sweep: an idle cart holds no inventory, and expiry       │
//! │  happens lazily the next time its owner shows up.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use keyfront_db::Database;

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};

/// Background task that releases stale license claims.
pub struct ClaimReaper {
    db: Arc<Database>,
    config: Arc<CheckoutConfig>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the reaper.
#[derive(Clone)]
pub struct ClaimReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ClaimReaperHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> CheckoutResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| CheckoutError::InvalidState("Reaper shutdown channel closed".into()))
    }
}

impl ClaimReaper {
    /// Creates a new reaper and returns a handle.
    pub fn new(db: Arc<Database>, config: Arc<CheckoutConfig>) -> (Self, ClaimReaperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let reaper = ClaimReaper {
            db,
            config,
            shutdown_rx,
        };
        let handle = ClaimReaperHandle { shutdown_tx };

        (reaper, handle)
    }

    /// Runs the reaper loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.reaper_interval.as_secs(),
            claim_ttl_secs = self.config.claim_ttl.as_secs(),
            "Claim reaper starting"
        );

        let mut interval = tokio::time::interval(self.config.reaper_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The immediate first tick would sweep at startup before any claim
        // could be stale; consume it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Reaper sweep failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Claim reaper shutting down");
                    break;
                }
            }
        }

        info!("Claim reaper stopped");
    }

    /// Releases every claim older than the claim TTL.
    async fn sweep(&self) -> CheckoutResult<usize> {
        let ttl = chrono::Duration::from_std(self.config.claim_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(180));
        let cutoff = chrono::Utc::now() - ttl;

        let released = self.db.licenses().release_stale(cutoff).await?;

        if !released.is_empty() {
            info!(count = released.len(), "Reaper released stale claims");
        }
        Ok(released.len())
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
    use keyfront_db::{ClaimOutcome, DbConfig};
    use std::time::Duration;

    async fn setup() -> (Arc<Database>, Sku) {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let now = Utc::now();
        let sku = Sku {
            id: "sku-1".to_string(),
            product_id: "prod-1".to_string(),
            code: "PRO-1Y".to_string(),
            name: "Pro (1 year)".to_string(),
            price_cents: 4999,
            is_lifetime: false,
            validity_days: Some(365),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.skus().insert(&sku).await.unwrap();
        db.licenses().create_batch(&sku, 3).await.unwrap();
        (db, sku)
    }

    #[tokio::test]
    async fn test_sweep_releases_only_stale_claims() {
        let (db, sku) = setup().await;

        let outcome = db.licenses().claim_batch(&sku.id, 2, "dead-attempt").await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed(_)));

        // Fresh claims survive a sweep with the default TTL.
        let config = Arc::new(CheckoutConfig::default());
        let (reaper, _handle) = ClaimReaper::new(db.clone(), config);
        assert_eq!(reaper.sweep().await.unwrap(), 0);
        assert_eq!(db.licenses().available_count(&sku.id).await.unwrap(), 1);

        // With a zero TTL every claim is stale.
        let config = Arc::new(CheckoutConfig::default().claim_ttl(Duration::from_secs(0)));
        let (reaper, _handle) = ClaimReaper::new(db.clone(), config);
        assert_eq!(reaper.sweep().await.unwrap(), 2);
        assert_eq!(db.licenses().available_count(&sku.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sweep_never_touches_sold() {
        let (db, sku) = setup().await;

        let outcome = db.licenses().claim_batch(&sku.id, 1, "attempt-1").await.unwrap();
        let id = match outcome {
            ClaimOutcome::Claimed(c) => c[0].id.clone(),
            other => panic!("expected claim, got {:?}", other),
        };
        db.licenses().mark_sold(&id, "attempt-1", "order-1").await.unwrap();

        let config = Arc::new(CheckoutConfig::default().claim_ttl(Duration::from_secs(0)));
        let (reaper, _handle) = ClaimReaper::new(db.clone(), config);
        assert_eq!(reaper.sweep().await.unwrap(), 0);

        let license = db.licenses().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(license.status, keyfront_core::LicenseStatus::Sold);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (db, _sku) = setup().await;
        let config = Arc::new(
            CheckoutConfig::default().reaper_interval(Duration::from_millis(10)),
        );

        let (reaper, handle) = ClaimReaper::new(db, config);
        let task = tokio::spawn(reaper.run());

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reaper did not stop")
            .unwrap();
    }
}
