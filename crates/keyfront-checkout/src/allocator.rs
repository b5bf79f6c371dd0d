//! # License Allocator
//!
//! The only component that moves licenses between states. Checkout and the
//! reaper both go through here, so the audit trail of every transition is
//! in one place.
//!
//! ## Claim Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Claim With Bounded Retry                           │
//! │                                                                         │
//! │  claim("sku-1", 2, attempt_id)                                          │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  LicenseRepository::claim_batch  ── one guarded UPDATE, all-or-nothing  │
//! │      │                                                                  │
//! │      ├── Claimed(licenses)    → Ok(licenses)                            │
//! │      ├── Insufficient{n}      → Err(InsufficientStock)   (no retry -    │
//! │      │                          stock will not appear by waiting)       │
//! │      └── DbError::Busy        → backoff (50ms, 100ms, 200ms, ...)       │
//! │                                 then retry, at most max_claim_retries   │
//! │                                 times, then Err(Conflict)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only lock contention is retried. Insufficient stock is a final answer,
//! and every other database error is a hard failure.

use std::sync::Arc;
use tracing::{error, info, warn};

use keyfront_db::{ClaimOutcome, ClaimedLicense, CommitOutcome, Database};

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};

/// Allocates licenses from the pool on behalf of checkout attempts.
#[derive(Clone)]
pub struct LicenseAllocator {
    db: Arc<Database>,
    config: Arc<CheckoutConfig>,
}

impl LicenseAllocator {
    /// Creates a new allocator.
    pub fn new(db: Arc<Database>, config: Arc<CheckoutConfig>) -> Self {
        LicenseAllocator { db, config }
    }

    /// Claims exactly `quantity` licenses of one SKU for `claimant`.
    ///
    /// ## Guarantees
    /// - Success means exactly `quantity` licenses moved unsold → claimed
    /// - Failure of any kind means zero licenses moved
    /// - Lock contention is retried with doubling backoff, then reported
    ///   as [`CheckoutError::Conflict`]
    pub async fn claim(
        &self,
        sku_id: &str,
        quantity: i64,
        claimant: &str,
    ) -> CheckoutResult<Vec<ClaimedLicense>> {
        let mut attempt: u32 = 0;

        loop {
            match self.db.licenses().claim_batch(sku_id, quantity, claimant).await {
                Ok(ClaimOutcome::Claimed(licenses)) => {
                    info!(
                        sku_id = %sku_id,
                        quantity,
                        claimant = %claimant,
                        attempt,
                        "Claimed licenses"
                    );
                    return Ok(licenses);
                }

                Ok(ClaimOutcome::Insufficient { available }) => {
                    return Err(CheckoutError::InsufficientStock {
                        sku_id: sku_id.to_string(),
                        requested: quantity,
                        available,
                    });
                }

                Err(e) if e.is_busy() && attempt < self.config.max_claim_retries => {
                    let backoff = self.config.claim_retry_backoff * 2u32.pow(attempt);
                    warn!(
                        sku_id = %sku_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Claim hit write-lock contention, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }

                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Releases a set of claims back to the pool. Best-effort: a failure
    /// to release one license is logged and does not stop the rest.
    ///
    /// Used as checkout compensation, where the original error must be
    /// reported to the client whatever happens here; anything left behind
    /// is picked up by the reaper.
    pub async fn release_all(&self, license_ids: &[String]) -> usize {
        let mut released = 0;

        for id in license_ids {
            match self.db.licenses().release(id).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(
                        license_id = %id,
                        error = %e,
                        "Failed to release claim; reaper will recover it"
                    );
                }
            }
        }

        if released > 0 {
            info!(released, total = license_ids.len(), "Released claims");
        }
        released
    }

    /// Commits a set of claims to an order, marking each license sold.
    ///
    /// Retried commits are safe (already-sold is a no-op). A license that
    /// is no longer claimed by `claimant` - reaped mid-checkout, which the
    /// claim TTL margin is sized to prevent - fails the whole commit with
    /// [`CheckoutError::InvalidState`].
    pub async fn commit_all(
        &self,
        licenses: &[ClaimedLicense],
        claimant: &str,
        order_id: &str,
    ) -> CheckoutResult<()> {
        for license in licenses {
            match self
                .db
                .licenses()
                .mark_sold(&license.id, claimant, order_id)
                .await?
            {
                CommitOutcome::Sold | CommitOutcome::AlreadySold => {}
                CommitOutcome::NotClaimed { current } => {
                    return Err(CheckoutError::InvalidState(format!(
                        "license {} expected claimed by {}, found {:?}",
                        license.id, claimant, current
                    )));
                }
            }
        }

        info!(
            count = licenses.len(),
            order_id = %order_id,
            "Committed claims to order"
        );
        Ok(())
    }

    /// Point-in-time count of unsold licenses for a SKU (display only).
    pub async fn available(&self, sku_id: &str) -> CheckoutResult<i64> {
        Ok(self.db.licenses().available_count(sku_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
