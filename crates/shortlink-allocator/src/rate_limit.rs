use crate::error::AllocError;
use shortlink_core::{Clock, CounterStore, SystemClock};
use std::time::Duration;
use tracing::{debug, trace};

/// Requests allowed per origin and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u64,
    pub window_seconds: u64,
}

impl RateLimitPolicy {
    pub fn new(limit: u64, window_seconds: u64) -> Result<Self, AllocError> {
        if window_seconds == 0 {
            return Err(AllocError::InvalidOptions(
                "rate limit window must be at least one second".to_string(),
            ));
        }
        Ok(Self {
            limit,
            window_seconds,
        })
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: 10,
            window_seconds: 60,
        }
    }
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_in_seconds: u64,
}

/// Fixed-window request counter keyed by origin.
///
/// Windows are aligned to the epoch, so a burst straddling a boundary can
/// be admitted up to twice the limit.
#[derive(Debug, Clone)]
pub struct RateLimiter<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: CounterStore> RateLimiter<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: CounterStore, C: Clock> RateLimiter<S, C> {
    /// Counter keys come from the store's own [`Keyspace`](shortlink_core::Keyspace).
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Counts one request from `origin` and reports whether it is admitted.
    ///
    /// Every call increments the counter, including rejected ones.
    pub async fn check(
        &self,
        origin: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<RateDecision, AllocError> {
        let window_millis = window_seconds
            .checked_mul(1000)
            .and_then(|millis| i64::try_from(millis).ok())
            .filter(|millis| *millis > 0)
            .ok_or_else(|| {
                AllocError::InvalidOptions(format!("invalid rate limit window: {window_seconds}s"))
            })?;

        let window_index = self.clock.now_millis().div_euclid(window_millis);
        let key = self.store.keyspace().rate_key(origin, window_index);

        let counted = self
            .store
            .incr_window(&key, Duration::from_secs(window_seconds))
            .await?;

        let decision = RateDecision {
            allowed: counted.count <= limit,
            remaining: limit.saturating_sub(counted.count),
            reset_in_seconds: counted.ttl_seconds.unwrap_or(window_seconds),
        };

        if decision.allowed {
            trace!(origin, count = counted.count, limit, "Request admitted");
        } else {
            debug!(origin, count = counted.count, limit, "Rate limit exceeded");
        }
        Ok(decision)
    }

    /// Like [`check`](Self::check), but turns a rejection into
    /// [`AllocError::RateLimited`].
    pub async fn admit(
        &self,
        origin: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateDecision, AllocError> {
        let decision = self
            .check(origin, policy.limit, policy.window_seconds)
            .await?;
        if !decision.allowed {
            return Err(AllocError::RateLimited {
                retry_after_seconds: decision.reset_in_seconds,
            });
        }
        Ok(decision)
    }
}
