//! GCRA (Generic Cell Rate Algorithm) decision engine
//!
//! This module provides the main [`RateLimiter`] struct, which turns a
//! key's stored theoretical arrival time plus the store's current time into
//! an admit/reject decision and a new state.

use super::{RateLimitError, rate::Rate, store::Store};
use std::time::Duration;

/// Bound on the optimistic read-compute-commit loop. Exceeding it is a
/// fatal, per-call error rather than an indefinite wait.
const MAX_ATTEMPTS: u32 = 10;

/// Result of a rate limit check
///
/// Describes the state of one key's bucket as observed by a single
/// [`RateLimiter::limit`] call. Constructed once per call, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// The maximum number of requests allowed in a burst (`max_burst + 1`).
    /// Constant for the lifetime of the limiter.
    pub limit: i64,
    /// How many unit-quantity requests are still admissible within the
    /// current tolerance window
    pub remaining: i64,
    /// Time until the bucket is fully empty again
    pub reset_after: Duration,
    /// Time until the specific rejected request would succeed. `None` for
    /// admitted requests, and for rejected requests whose quantity exceeds
    /// what the configured burst could ever satisfy (waiting will not help).
    pub retry_after: Option<Duration>,
}

/// GCRA (Generic Cell Rate Algorithm) rate limiter
///
/// The limiter owns the rate parameters and a [`Store`] holding per-key
/// state. It is synchronous and stateless between calls: safety under
/// concurrent use from many processes comes entirely from the store's
/// atomic conditional writes. Competing callers resolve races by optimistic
/// retry, never by blocking.
///
/// # Example
///
/// ```
/// use throttlemesh::{MemoryStore, Rate, RateLimiter};
///
/// // 100 requests per minute with a burst of 10
/// let mut limiter = RateLimiter::new(MemoryStore::new(), Rate::per_minute(100), 9);
///
/// let (limited, result) = limiter.limit("api_key", 1)?;
/// assert!(!limited);
/// assert_eq!(result.limit, 10);
/// # Ok::<(), throttlemesh::RateLimitError>(())
/// ```
pub struct RateLimiter<S: Store> {
    store: S,
    /// Time cost of one unit of quantity, in nanoseconds
    emission_interval: i64,
    /// Total burst capacity as a duration: `emission_interval * (max_burst + 1)`
    delay_variation_tolerance: i64,
    limit: i64,
}

impl<S: Store> RateLimiter<S> {
    /// Create a new rate limiter.
    ///
    /// One unit of quantity costs one `rate` period; `max_burst` extra
    /// units may arrive ahead of the smoothed schedule before requests are
    /// rejected, so `max_burst + 1` unit requests can land back-to-back on
    /// an empty bucket.
    ///
    /// # Panics
    ///
    /// Panics if the rate period is zero.
    pub fn new(store: S, rate: Rate, max_burst: u32) -> Self {
        let emission_interval = rate.period().as_nanos() as i64;
        assert!(emission_interval > 0, "rate period must be non-zero");

        RateLimiter {
            store,
            emission_interval,
            delay_variation_tolerance: emission_interval * (max_burst as i64 + 1),
            limit: max_burst as i64 + 1,
        }
    }

    /// Check whether `quantity` units for `key` are admitted under the rate
    /// limit, and charge them if so.
    ///
    /// A quantity of zero peeks at the bucket without consuming capacity.
    ///
    /// # Returns
    ///
    /// - `(true, result)`: the request is limited. The bucket is left
    ///   exactly as found; `result.retry_after` says when (or whether) a
    ///   retry can succeed.
    /// - `(false, result)`: the request is admitted and charged.
    ///
    /// # Errors
    ///
    /// - [`RateLimitError::StoreUpdateFailed`]: ten consecutive write
    ///   attempts lost the race to concurrent writers
    /// - [`RateLimitError::Store`]: the store reported a failure
    ///
    /// # Example
    ///
    /// ```
    /// use throttlemesh::{MemoryStore, Rate, RateLimiter};
    ///
    /// let mut limiter = RateLimiter::new(MemoryStore::new(), Rate::per_second(1), 4);
    ///
    /// match limiter.limit("user:123", 1) {
    ///     Ok((false, result)) => println!("allowed, {} remaining", result.remaining),
    ///     Ok((true, result)) => println!("limited, retry: {:?}", result.retry_after),
    ///     Err(e) => eprintln!("store trouble: {e}"),
    /// }
    /// ```
    pub fn limit(
        &mut self,
        key: &str,
        quantity: u32,
    ) -> Result<(bool, RateLimitResult), RateLimitError> {
        let increment = self.emission_interval.saturating_mul(quantity as i64);

        for attempt in 0..MAX_ATTEMPTS {
            // tat is the theoretical arrival time that would be expected
            // from equally spaced requests at exactly the rate limit.
            let (stored_tat, now) = self.store.get_with_time(key)?;
            let tat = stored_tat.unwrap_or(now);

            // The new theoretical arrival time if this request succeeds.
            // A tat in the past (drained bucket) counts from now instead,
            // so a tolerance of at least one interval always admits a
            // quantity-1 request on an empty bucket.
            let new_tat = now.max(tat).saturating_add(increment);

            let allow_at_and_after = new_tat - self.delay_variation_tolerance;
            if now < allow_at_and_after {
                // Non-zero when this quantity is blocked but smaller
                // quantities are still allowed.
                let remaining =
                    (self.delay_variation_tolerance - (tat - now)) / self.emission_interval;

                // A blocked request is not charged: reset_after uses the
                // stored tat, not new_tat.
                let reset_after = Duration::from_nanos((tat - now).max(0) as u64);

                // No retry hint for a request larger than the maximum
                // quantity; it cannot succeed at any point in time.
                let retry_after = if increment <= self.delay_variation_tolerance {
                    Some(Duration::from_nanos((allow_at_and_after - now) as u64))
                } else {
                    None
                };

                let info = RateLimitResult {
                    limit: self.limit,
                    remaining,
                    reset_after,
                    retry_after,
                };
                return Ok((true, info));
            }

            // Time until the bucket is empty again
            let ttl = new_tat - now;

            let updated = match stored_tat {
                None => self.store.set_if_not_exists_with_ttl(
                    key,
                    new_tat,
                    Duration::from_nanos(ttl as u64),
                )?,
                Some(old) => self.store.compare_and_set_with_ttl(
                    key,
                    old,
                    new_tat,
                    Duration::from_nanos(ttl as u64),
                )?,
            };

            if updated {
                let info = RateLimitResult {
                    limit: self.limit,
                    remaining: (self.delay_variation_tolerance - ttl) / self.emission_interval,
                    reset_after: Duration::from_nanos(ttl as u64),
                    retry_after: None,
                };
                return Ok((false, info));
            }

            // Lost the race to a concurrent writer: the decision must be
            // based on the value that was actually committed, so re-read
            // and recompute from fresh state.
            tracing::debug!(
                "lost rate limit write race for key '{}' (attempt {})",
                key,
                attempt + 1
            );
        }

        Err(RateLimitError::StoreUpdateFailed {
            key: key.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Overwrite the stored state for `key` to that of a bucket that has
    /// just overflowed, ignoring any existing data.
    ///
    /// For callers that detect abuse through an out-of-band signal and want
    /// to pre-emptively exhaust a key's quota: the next unit request is
    /// rejected with a `retry_after` of one full rate period.
    ///
    /// # Errors
    ///
    /// Same as [`RateLimiter::limit`].
    pub fn mark_overflowed(&mut self, key: &str) -> Result<(), RateLimitError> {
        for attempt in 0..MAX_ATTEMPTS {
            let (stored_tat, now) = self.store.get_with_time(key)?;
            let new_value = now.saturating_add(self.delay_variation_tolerance);
            let ttl = Duration::from_nanos(self.delay_variation_tolerance as u64);

            let updated = match stored_tat {
                None => self.store.set_if_not_exists_with_ttl(key, new_value, ttl)?,
                Some(old) => self.store.compare_and_set_with_ttl(key, old, new_value, ttl)?,
            };

            if updated {
                return Ok(());
            }

            tracing::debug!(
                "lost rate limit write race for key '{}' (attempt {})",
                key,
                attempt + 1
            );
        }

        Err(RateLimitError::StoreUpdateFailed {
            key: key.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }
}
