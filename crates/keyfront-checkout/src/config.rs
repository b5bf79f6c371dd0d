//! # Checkout Configuration
//!
//! Tuning knobs for the cart service, allocator, orchestrator and reaper.
//!
//! ## Timing Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Timing Relationships                                │
//! │                                                                         │
//! │  claim_retry_backoff (50ms base, doubled per attempt)                   │
//! │      «  checkout_timeout (30s)   - one checkout attempt, end to end     │
//! │      «  claim_ttl        (180s)  - how long a claim may sit before      │
//! │                                    the reaper takes it back             │
//! │      «  cart_ttl         (24h)   - idle life of an active cart          │
//! │                                                                         │
//! │  INVARIANT: claim_ttl must comfortably exceed checkout_timeout.         │
//! │  A claim held by a live checkout must never look stale; the default     │
//! │  keeps a 6x margin.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

/// Configuration for checkout and allocation behavior.
///
/// ## Example
/// ```rust,ignore
/// let config = CheckoutConfig::default()
///     .checkout_timeout(Duration::from_secs(10))
///     .reaper_interval(Duration::from_secs(30));
/// config.validate()?;
/// ```
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Overall deadline for one checkout attempt.
    /// Default: 30 seconds
    pub checkout_timeout: Duration,

    /// How many times a claim is retried on write-lock contention
    /// before surfacing a transient conflict. Default: 3
    pub max_claim_retries: u32,

    /// Base backoff between claim retries; doubled on each attempt.
    /// Default: 50 milliseconds
    pub claim_retry_backoff: Duration,

    /// Age at which a lingering claim is considered orphaned and
    /// released by the reaper. Default: 180 seconds (6x checkout_timeout)
    pub claim_ttl: Duration,

    /// How often the reaper sweeps for stale claims.
    /// Default: 60 seconds
    pub reaper_interval: Duration,

    /// Idle lifetime of an active cart; refreshed on every mutation.
    /// Default: 24 hours
    pub cart_ttl: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        let checkout_timeout = Duration::from_secs(30);
        CheckoutConfig {
            checkout_timeout,
            max_claim_retries: 3,
            claim_retry_backoff: Duration::from_millis(50),
            claim_ttl: checkout_timeout * 6,
            reaper_interval: Duration::from_secs(60),
            cart_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CheckoutConfig {
    /// Sets the overall checkout deadline and rescales the claim TTL to
    /// keep the 6x margin, unless the TTL was set explicitly afterwards.
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self.claim_ttl = timeout * 6;
        self
    }

    /// Sets the number of claim retries on lock contention.
    pub fn max_claim_retries(mut self, retries: u32) -> Self {
        self.max_claim_retries = retries;
        self
    }

    /// Sets the base claim retry backoff.
    pub fn claim_retry_backoff(mut self, backoff: Duration) -> Self {
        self.claim_retry_backoff = backoff;
        self
    }

    /// Sets the stale-claim age explicitly.
    pub fn claim_ttl(mut self, ttl: Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    /// Sets the reaper sweep interval.
    pub fn reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    /// Sets the idle cart lifetime.
    pub fn cart_ttl(mut self, ttl: Duration) -> Self {
        self.cart_ttl = ttl;
        self
    }

    /// Checks the timing invariants.
    ///
    /// ## Errors
    /// Returns a description of the violated invariant:
    /// - `claim_ttl` must be at least twice `checkout_timeout`, or the
    ///   reaper could release a claim out from under a live checkout
    /// - `checkout_timeout` and `reaper_interval` must be non-zero
    pub fn validate(&self) -> Result<(), String> {
        if self.checkout_timeout.is_zero() {
            return Err("checkout_timeout must be non-zero".to_string());
        }
        if self.reaper_interval.is_zero() {
            return Err("reaper_interval must be non-zero".to_string());
        }
        if self.claim_ttl < self.checkout_timeout * 2 {
            return Err(format!(
                "claim_ttl ({:?}) must be at least twice checkout_timeout ({:?})",
                self.claim_ttl, self.checkout_timeout
            ));
        }
        Ok(())
    }
}
