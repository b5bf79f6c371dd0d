//! # License Repository
//!
//! Database operations for the per-SKU license pool - the one shared,
//! mutable resource in the system.
//!
//! ## License Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      License Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (admin batch)                                                │
//! │     └── create_batch(sku, 15) → 15 unsold rows with unique tokens       │
//! │                                                                         │
//! │  2. CLAIM (checkout start)                                              │
//! │     └── claim_batch(sku_id, qty, attempt) → unsold → claimed            │
//! │         Single UPDATE..RETURNING inside one transaction:                │
//! │         fewer matching rows than requested ⇒ ROLLBACK, nothing claimed  │
//! │                                                                         │
//! │  3a. COMMIT (order recorded)                                            │
//! │      └── mark_sold(id, attempt, order) → claimed → sold (terminal)      │
//! │                                                                         │
//! │  3b. RELEASE (checkout failed / reaper)                                 │
//! │      └── release(id) → claimed → unsold (idempotent)                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why the claim is race-free
//! The claim statement is simultaneously the availability check and the
//! flip: it only matches rows whose `status` is still `'unsold'` at
//! execution time, and SQLite serializes writers, so two concurrent claims
//! can never select the same row. There is no separate count read whose
//! result could go stale.
//!
//! Every state transition here is logged with before/after state so an
//! oversell incident would be detectable post-hoc from the audit trail.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use keyfront_core::{License, LicenseStatus, Sku};

/// All license columns, in the order the `License` struct expects.
const LICENSE_COLUMNS: &str =
    "id, sku_id, token, status, claimed_by, claimed_at, sold_at, order_id, created_at";

// =============================================================================
// Claim Results
// =============================================================================

/// A successfully claimed license (id + the token delivered at checkout).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimedLicense {
    pub id: String,
    pub token: String,
}

/// Outcome of a batch claim attempt.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// Exactly the requested quantity was flipped unsold → claimed.
    Claimed(Vec<ClaimedLicense>),
    /// Fewer than `requested` rows were unsold; nothing was claimed.
    Insufficient { available: i64 },
}

/// Outcome of a claimed → sold transition attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The license transitioned to sold.
    Sold,
    /// The license was already sold - safe no-op for retried commits.
    AlreadySold,
    /// The license is not claimed by this caller (never claimed, reaped,
    /// or claimed by a different attempt).
    NotClaimed { current: LicenseStatus },
}

// =============================================================================
// License Repository
// =============================================================================

/// Repository for license pool operations.
#[derive(Debug, Clone)]
pub struct LicenseRepository {
    pool: SqlitePool,
}

impl LicenseRepository {
    /// Creates a new LicenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LicenseRepository { pool }
    }

    /// Creates `count` unsold licenses for a SKU with unique tokens.
    ///
    /// ## Token Format
    /// `{sku code}-{seq}-{random suffix}`, e.g. `PRO-1Y-0007-a41c9f02`.
    /// The sequence continues from the number of existing licenses; the
    /// random suffix makes the token collision-free even across deletions,
    /// and the UNIQUE index is the final guarantee.
    ///
    /// Count validation (`> 0`, batch cap) happens in keyfront-core before
    /// this is called.
    pub async fn create_batch(&self, sku: &Sku, count: i64) -> DbResult<Vec<License>> {
        debug!(sku_id = %sku.id, count, "Creating license batch");

        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM licenses WHERE sku_id = ?1")
            .bind(&sku.id)
            .fetch_one(&mut *tx)
            .await?;

        let now = Utc::now();
        let mut created = Vec::with_capacity(count as usize);

        for seq in 0..count {
            let license = License {
                id: Uuid::new_v4().to_string(),
                sku_id: sku.id.clone(),
                token: generate_token(&sku.code, existing + seq + 1),
                status: LicenseStatus::Unsold,
                claimed_by: None,
                claimed_at: None,
                sold_at: None,
                order_id: None,
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO licenses (
                    id, sku_id, token, status,
                    claimed_by, claimed_at, sold_at, order_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&license.id)
            .bind(&license.sku_id)
            .bind(&license.token)
            .bind(license.status)
            .bind(&license.claimed_by)
            .bind(license.claimed_at)
            .bind(license.sold_at)
            .bind(&license.order_id)
            .bind(license.created_at)
            .execute(&mut *tx)
            .await?;

            created.push(license);
        }

        tx.commit().await?;

        info!(sku_id = %sku.id, count, "License batch created");
        Ok(created)
    }

    /// Counts currently unsold licenses for a SKU. Side-effect-free.
    ///
    /// This read is for display and diagnostics only - the claim never
    /// trusts it (the claim statement re-checks status row by row).
    pub async fn available_count(&self, sku_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM licenses WHERE sku_id = ?1 AND status = 'unsold'",
        )
        .bind(sku_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Atomically claims exactly `quantity` unsold licenses for a SKU.
    ///
    /// ## All-Or-Nothing
    /// One transaction, one `UPDATE ... WHERE id IN (SELECT ... LIMIT ?)
    /// RETURNING`. If the statement flips fewer rows than requested, the
    /// transaction rolls back and `Insufficient` is returned with stock
    /// unchanged. No other caller can observe a partially-claimed batch.
    ///
    /// ## Concurrency
    /// Two concurrent claims for the same SKU serialize on SQLite's write
    /// lock; the loser either sees the remaining unsold rows (and wins or
    /// gets `Insufficient`) or surfaces `DbError::Busy` for the allocator's
    /// bounded retry.
    pub async fn claim_batch(
        &self,
        sku_id: &str,
        quantity: i64,
        claimant: &str,
    ) -> DbResult<ClaimOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query_as::<_, ClaimedLicense>(
            r#"
            UPDATE licenses
            SET status = 'claimed', claimed_by = ?1, claimed_at = ?2
            WHERE id IN (
                SELECT id FROM licenses
                WHERE sku_id = ?3 AND status = 'unsold'
                ORDER BY created_at, rowid
                LIMIT ?4
            )
            RETURNING id, token
            "#,
        )
        .bind(claimant)
        .bind(now)
        .bind(sku_id)
        .bind(quantity)
        .fetch_all(&mut *tx)
        .await?;

        if (claimed.len() as i64) < quantity {
            let available = claimed.len() as i64;
            tx.rollback().await?;
            info!(
                sku_id = %sku_id,
                requested = quantity,
                available,
                claimant = %claimant,
                "Claim rejected: insufficient unsold licenses (rolled back)"
            );
            return Ok(ClaimOutcome::Insufficient { available });
        }

        tx.commit().await?;

        for license in &claimed {
            info!(
                license_id = %license.id,
                sku_id = %sku_id,
                claimant = %claimant,
                from = "unsold",
                to = "claimed",
                "License state transition"
            );
        }

        Ok(ClaimOutcome::Claimed(claimed))
    }

    /// Releases a claimed license back to unsold. Idempotent.
    ///
    /// ## Returns
    /// * `Ok(true)` - the license transitioned claimed → unsold
    /// * `Ok(false)` - no-op: the license was already unsold or already sold
    ///
    /// Releasing a sold license is deliberately a no-op, not an error:
    /// the reaper may race a commit, and the loser of that race must not
    /// abort the sweep.
    pub async fn release(&self, license_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE licenses
            SET status = 'unsold', claimed_by = NULL, claimed_at = NULL
            WHERE id = ?1 AND status = 'claimed'
            "#,
        )
        .bind(license_id)
        .execute(&self.pool)
        .await?;

        let released = result.rows_affected() > 0;
        if released {
            info!(
                license_id = %license_id,
                from = "claimed",
                to = "unsold",
                "License state transition"
            );
        } else {
            debug!(license_id = %license_id, "Release no-op (not claimed)");
        }

        Ok(released)
    }

    /// Releases every claim older than `cutoff`. Used by the claim reaper.
    ///
    /// One UPDATE that only touches still-`claimed` rows, so it cannot
    /// un-sell a license that a concurrent commit just finalized.
    pub async fn release_stale(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            UPDATE licenses
            SET status = 'unsold', claimed_by = NULL, claimed_at = NULL
            WHERE status = 'claimed' AND claimed_at < ?1
            RETURNING id, sku_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        for (id, sku_id) in &rows {
            warn!(
                license_id = %id,
                sku_id = %sku_id,
                from = "claimed",
                to = "unsold",
                "Stale claim released by reaper"
            );
        }

        Ok(rows.into_iter().map(|(id, _)| id).collect())
    }

    /// Transitions a license claimed by `claimant` to sold, stamping the
    /// order id.
    ///
    /// ## Double-Submission Defense
    /// The UPDATE is guarded on both `status = 'claimed'` and
    /// `claimed_by = claimant`; a license claimed by a different checkout
    /// attempt (or never claimed, or reaped mid-checkout) reports
    /// `NotClaimed` and the caller decides whether that is fatal.
    /// A license already sold reports `AlreadySold` - safe for retries.
    pub async fn mark_sold(
        &self,
        license_id: &str,
        claimant: &str,
        order_id: &str,
    ) -> DbResult<CommitOutcome> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE licenses
            SET status = 'sold', sold_at = ?2, order_id = ?3,
                claimed_by = NULL, claimed_at = NULL
            WHERE id = ?1 AND status = 'claimed' AND claimed_by = ?4
            "#,
        )
        .bind(license_id)
        .bind(now)
        .bind(order_id)
        .bind(claimant)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                license_id = %license_id,
                order_id = %order_id,
                from = "claimed",
                to = "sold",
                "License state transition"
            );
            return Ok(CommitOutcome::Sold);
        }

        // Nothing matched: distinguish the no-op retry from a real violation.
        let current: LicenseStatus =
            sqlx::query_scalar("SELECT status FROM licenses WHERE id = ?1")
                .bind(license_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("License", license_id))?;

        match current {
            LicenseStatus::Sold => {
                debug!(license_id = %license_id, "Commit no-op (already sold)");
                Ok(CommitOutcome::AlreadySold)
            }
            other => {
                warn!(
                    license_id = %license_id,
                    status = ?other,
                    claimant = %claimant,
                    "Commit rejected: license not claimed by caller"
                );
                Ok(CommitOutcome::NotClaimed { current: other })
            }
        }
    }

    /// Gets a license by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<License>> {
        let license = sqlx::query_as::<_, License>(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(license)
    }

    /// Lists all licenses for a SKU (administrative read).
    pub async fn list_for_sku(&self, sku_id: &str) -> DbResult<Vec<License>> {
        let licenses = sqlx::query_as::<_, License>(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses \
             WHERE sku_id = ?1 ORDER BY created_at, rowid"
        ))
        .bind(sku_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(licenses)
    }

    /// Deletes unsold and claimed licenses of a SKU (administrative, used
    /// when the parent product is deleted). Sold licenses are history and
    /// are kept.
    pub async fn delete_for_sku(&self, sku_id: &str) -> DbResult<u64> {
        let result =
            sqlx::query("DELETE FROM licenses WHERE sku_id = ?1 AND status != 'sold'")
                .bind(sku_id)
                .execute(&self.pool)
                .await?;

        info!(sku_id = %sku_id, deleted = result.rows_affected(), "Licenses deleted with SKU");
        Ok(result.rows_affected())
    }
}

/// Generates a license token: `{code}-{seq}-{random suffix}`.
fn generate_token(sku_code: &str, seq: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    format!("{}-{:04}-{}", sku_code, seq, suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================
