//! Time sources for store implementations
//!
//! The store contract requires `now` to come from one authoritative clock
//! shared by everyone reading and writing a key, never from the caller.
//! Networked stores read their server's clock; [`MemoryStore`] reads a
//! [`Clock`] it owns.
//!
//! [`MemoryStore`]: crate::MemoryStore

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time in nanoseconds since the Unix epoch.
pub trait Clock {
    /// Returns the current time in nanoseconds since the Unix epoch.
    fn now_ns(&self) -> i64;
}

/// The system wall clock. This is the default clock for [`MemoryStore`].
///
/// [`MemoryStore`]: crate::MemoryStore
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        // A clock before the Unix epoch reads as zero; the store keeps
        // observed time nondecreasing on top of this.
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_nanos() as i64,
            Err(_) => 0,
        }
    }
}

/// A manually driven clock for tests and simulations.
///
/// Handles are cheap to clone and share one instant, so a test can keep a
/// handle and move time forward while the store (and the limiter that owns
/// it) holds another.
///
/// # Example
///
/// ```
/// use throttlemesh::{ManualClock, MemoryStore, Rate, RateLimiter};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(0);
/// let store = MemoryStore::builder().clock(clock.clone()).build();
/// let mut limiter = RateLimiter::new(store, Rate::per_second(1), 0);
///
/// let (limited, _) = limiter.limit("key", 1)?;
/// assert!(!limited);
///
/// clock.advance(Duration::from_secs(1));
/// let (limited, _) = limiter.limit("key", 1)?;
/// assert!(!limited);
/// # Ok::<(), throttlemesh::RateLimitError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading `now_ns` nanoseconds since the Unix epoch.
    pub fn new(now_ns: i64) -> Self {
        ManualClock {
            now_ns: Arc::new(AtomicI64::new(now_ns)),
        }
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, now_ns: i64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now_ns
            .fetch_add(delta.as_nanos() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        // 2020-01-01 in nanoseconds since the epoch
        assert!(SystemClock.now_ns() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(5);
        assert_eq!(clock.now_ns(), 5);

        clock.advance(Duration::from_nanos(10));
        assert_eq!(clock.now_ns(), 15);

        clock.set(1_000);
        assert_eq!(clock.now_ns(), 1_000);
    }

    #[test]
    fn manual_clock_handles_share_one_instant() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();

        handle.advance(Duration::from_secs(1));
        assert_eq!(clock.now_ns(), 1_000_000_000);
    }
}
