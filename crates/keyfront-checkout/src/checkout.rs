//! # Checkout Orchestrator
//!
//! Converts a cart into an order with licenses attached, without ever
//! overselling and without leaking claims.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Flow                                      │
//! │                                                                         │
//! │  ── timed section (checkout_timeout) ─────────────────────────────────  │
//! │  1. Load active cart; empty cart fails fast, nothing touched            │
//! │  2. Claim licenses per line, in cart order                              │
//! │       line fails → release every earlier claim, reverse order, abort    │
//! │  3. Record the order (header + frozen line snapshots)                   │
//! │  ── point of no return ───────────────────────────────────────────────  │
//! │  4. Commit every claim: claimed → sold, stamped with the order id       │
//! │  5. Mark the cart converted                                             │
//! │                                                                         │
//! │  TIMEOUT: steps 1-3 run under the deadline. Claims and the order row    │
//! │  are tracked in a compensation log that survives cancellation, so a     │
//! │  timed-out checkout releases exactly what it took. Steps 4-5 are fast   │
//! │  local writes and are never cancelled: once the order exists with       │
//! │  claims in hand, the checkout completes.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The failure contract is all-or-nothing: after any error response the
//! cart is unchanged and still active, no license is left claimed or sold,
//! and no order row remains.

use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use keyfront_core::{validation, Cart, CoreError, Order};
use keyfront_db::{ClaimedLicense, Database};

use crate::allocator::LicenseAllocator;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Observer Trait
// =============================================================================

/// Trait for observing checkout outcomes (implemented by the API layer for
/// notification fan-out; tests use the no-op).
pub trait CheckoutObserver: Send + Sync {
    /// Called after a checkout fully completes.
    fn on_completed(&self, user_id: &str, order_id: &str, total_cents: i64);

    /// Called after a checkout fails and its compensation has run.
    fn on_failed(&self, user_id: &str, reason: &str);
}

/// No-op observer for testing and headless use.
pub struct NoOpObserver;

impl CheckoutObserver for NoOpObserver {
    fn on_completed(&self, _user_id: &str, _order_id: &str, _total_cents: i64) {}
    fn on_failed(&self, _user_id: &str, _reason: &str) {}
}

// =============================================================================
// Receipt
// =============================================================================

/// A license issued by a completed checkout.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedLicense {
    pub sku_id: String,
    pub token: String,
}

/// The result of a successful checkout.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub licenses: Vec<IssuedLicense>,
}

/// What the timed section took, so a cancelled checkout can give it back.
#[derive(Default)]
struct CompensationLog {
    claimed_ids: Vec<String>,
    order_id: Option<String>,
}

/// Per-line claims carried from the timed section into the commit phase.
struct ClaimedLine {
    sku_id: String,
    licenses: Vec<ClaimedLicense>,
}

// =============================================================================
// Checkout Orchestrator
// =============================================================================

/// Orchestrates the cart → order conversion.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    db: Arc<Database>,
    allocator: LicenseAllocator,
    config: Arc<CheckoutConfig>,
    observer: Arc<dyn CheckoutObserver>,
}

impl CheckoutOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        db: Arc<Database>,
        config: Arc<CheckoutConfig>,
        observer: Arc<dyn CheckoutObserver>,
    ) -> Self {
        let allocator = LicenseAllocator::new(db.clone(), config.clone());
        CheckoutOrchestrator {
            db,
            allocator,
            config,
            observer,
        }
    }

    /// Returns the allocator (shared with the reaper and diagnostics).
    pub fn allocator(&self) -> &LicenseAllocator {
        &self.allocator
    }

    /// Runs a checkout for the user's active cart.
    pub async fn checkout(&self, user_id: &str) -> CheckoutResult<CheckoutReceipt> {
        validation::validate_user_id(user_id).map_err(CoreError::from)?;

        let attempt_id = Uuid::new_v4().to_string();
        let log = Arc::new(Mutex::new(CompensationLog::default()));

        info!(user_id = %user_id, attempt_id = %attempt_id, "Checkout started");

        // Steps 1-3 under the deadline. The log outlives the future, so a
        // timeout can release exactly the claims (and order) it left behind.
        let timed = tokio::time::timeout(
            self.config.checkout_timeout,
            self.claim_and_record(user_id, &attempt_id, log.clone()),
        )
        .await;

        let (cart, order, lines) = match timed {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                self.observer.on_failed(user_id, &e.to_string());
                return Err(e);
            }
            Err(_elapsed) => {
                self.compensate_timeout(&log).await;
                let e = CheckoutError::Timeout(self.config.checkout_timeout);
                self.observer.on_failed(user_id, &e.to_string());
                return Err(e);
            }
        };

        // Step 4: point of no return - fast local writes, not cancellable.
        if let Err(e) = self.commit_lines(&lines, &attempt_id, &order.id).await {
            self.compensate_failed_commit(&lines, &order.id).await;
            self.observer.on_failed(user_id, &e.to_string());
            return Err(e);
        }

        // Step 5: retire the cart. The sale is already durable; a failure
        // here is logged, not unwound.
        if let Err(e) = self.db.carts().mark_converted(&cart.id).await {
            error!(
                cart_id = %cart.id,
                order_id = %order.id,
                error = %e,
                "Order committed but cart conversion failed"
            );
        }

        let licenses: Vec<IssuedLicense> = lines
            .into_iter()
            .flat_map(|line| {
                line.licenses.into_iter().map(move |l| IssuedLicense {
                    sku_id: line.sku_id.clone(),
                    token: l.token,
                })
            })
            .collect();

        info!(
            user_id = %user_id,
            order_id = %order.id,
            total_cents = order.total_amount_cents,
            licenses = licenses.len(),
            "Checkout completed"
        );
        self.observer
            .on_completed(user_id, &order.id, order.total_amount_cents);

        Ok(CheckoutReceipt { order, licenses })
    }

    /// Steps 1-3: validate the cart, claim every line, record the order.
    ///
    /// On any failure this releases its own claims in reverse claim order
    /// before returning, so the caller only compensates for cancellation.
    async fn claim_and_record(
        &self,
        user_id: &str,
        attempt_id: &str,
        log: Arc<Mutex<CompensationLog>>,
    ) -> CheckoutResult<(Cart, Order, Vec<ClaimedLine>)> {
        let cart = self
            .db
            .carts()
            .get_active(user_id)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut lines: Vec<ClaimedLine> = Vec::with_capacity(cart.items.len());

        for item in &cart.items {
            match self
                .allocator
                .claim(&item.sku_id, item.quantity, attempt_id)
                .await
            {
                Ok(licenses) => {
                    if let Ok(mut log) = log.lock() {
                        log.claimed_ids.extend(licenses.iter().map(|l| l.id.clone()));
                    }
                    lines.push(ClaimedLine {
                        sku_id: item.sku_id.clone(),
                        licenses,
                    });
                }
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        sku_id = %item.sku_id,
                        error = %e,
                        "Claim failed, releasing earlier claims"
                    );
                    self.release_lines(&lines).await;
                    return Err(e);
                }
            }
        }

        let order = match self.db.orders().create_from_cart(&cart).await {
            Ok(order) => order,
            Err(e) => {
                self.release_lines(&lines).await;
                return Err(e.into());
            }
        };
        if let Ok(mut log) = log.lock() {
            log.order_id = Some(order.id.clone());
        }

        Ok((cart, order, lines))
    }

    /// Step 4: flip every claim to sold against the recorded order.
    async fn commit_lines(
        &self,
        lines: &[ClaimedLine],
        attempt_id: &str,
        order_id: &str,
    ) -> CheckoutResult<()> {
        for line in lines {
            self.allocator
                .commit_all(&line.licenses, attempt_id, order_id)
                .await?;
        }
        Ok(())
    }

    /// Releases claimed lines in reverse claim order.
    async fn release_lines(&self, lines: &[ClaimedLine]) {
        for line in lines.iter().rev() {
            let ids: Vec<String> = line.licenses.iter().map(|l| l.id.clone()).collect();
            self.allocator.release_all(&ids).await;
        }
    }

    /// Gives back everything a cancelled timed section logged.
    async fn compensate_timeout(&self, log: &Arc<Mutex<CompensationLog>>) {
        let (claimed_ids, order_id) = match log.lock() {
            Ok(log) => (log.claimed_ids.clone(), log.order_id.clone()),
            Err(_) => return,
        };

        warn!(
            claims = claimed_ids.len(),
            had_order = order_id.is_some(),
            "Checkout timed out, compensating"
        );

        self.allocator.release_all(&claimed_ids).await;
        if let Some(order_id) = order_id {
            if let Err(e) = self.db.orders().delete(&order_id).await {
                error!(order_id = %order_id, error = %e, "Failed to delete order after timeout");
            }
        }
    }

    /// Unwinds a failed commit phase.
    ///
    /// Release is status-guarded, so licenses that were already sold stay
    /// sold; the order row is only deleted when nothing points at it.
    async fn compensate_failed_commit(&self, lines: &[ClaimedLine], order_id: &str) {
        self.release_lines(lines).await;

        let mut any_sold = false;
        for line in lines {
            for license in &line.licenses {
                if let Ok(Some(l)) = self.db.licenses().get_by_id(&license.id).await {
                    if l.order_id.as_deref() == Some(order_id) {
                        any_sold = true;
                    }
                }
            }
        }

        if any_sold {
            error!(
                order_id = %order_id,
                "Commit failed after some licenses were sold; order retained for manual review"
            );
        } else if let Err(e) = self.db.orders().delete(order_id).await {
            error!(order_id = %order_id, error = %e, "Failed to delete order after commit failure");
        }
    }
}
