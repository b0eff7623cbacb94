use super::{Store, StoreError};
use crate::core::clock::{Clock, SystemClock};
use std::time::Duration;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: i64,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// In-memory reference implementation of the [`Store`] contract
///
/// Backed by a hash map with per-entry expiration. Expired entries are
/// treated as absent by every operation and swept out at fixed intervals
/// during writes, so an inactive key eventually disappears.
///
/// Suitable for tests and for single-process deployments; cluster-wide
/// enforcement needs a store shared between processes.
///
/// # Example
///
/// ```
/// use throttlemesh::{MemoryStore, Rate, RateLimiter};
///
/// let mut limiter = RateLimiter::new(MemoryStore::new(), Rate::per_second(10), 9);
/// ```
pub struct MemoryStore<C: Clock = SystemClock> {
    data: HashMap<String, Entry>,
    clock: C,
    // Highest timestamp handed out so far; observed time never regresses.
    last_now: i64,
    next_cleanup: i64,
    cleanup_interval: i64,
}

/// Builder for configuring a [`MemoryStore`]
///
/// # Example
///
/// ```
/// use throttlemesh::MemoryStore;
/// use std::time::Duration;
///
/// let store = MemoryStore::builder()
///     .capacity(100_000)
///     .cleanup_interval(Duration::from_secs(120))
///     .build();
/// ```
pub struct MemoryStoreBuilder<C: Clock = SystemClock> {
    capacity: usize,
    cleanup_interval: Duration,
    clock: C,
}

impl MemoryStore<SystemClock> {
    /// Create a store with default capacity, cleanup interval, and the
    /// system clock.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder for configuring a MemoryStore.
    pub fn builder() -> MemoryStoreBuilder<SystemClock> {
        MemoryStoreBuilder {
            capacity: DEFAULT_CAPACITY,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            clock: SystemClock,
        }
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Current time in nanoseconds, clamped to be nondecreasing.
    fn now(&mut self) -> i64 {
        let now = self.clock.now_ns().max(self.last_now);
        self.last_now = now;
        now
    }

    fn maybe_clean_expired(&mut self, now: i64) {
        if now >= self.next_cleanup {
            self.data.retain(|_, entry| entry.is_live(now));
            self.next_cleanup = now + self.cleanup_interval;
        }
    }

    fn expires_at(now: i64, ttl: Duration) -> i64 {
        // A ttl that rounds to zero still has to produce an expiration in
        // the future.
        now + (ttl.as_nanos() as i64).max(1)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }
}

impl<C: Clock> Store for MemoryStore<C> {
    fn get_with_time(&mut self, key: &str) -> Result<(Option<i64>, i64), StoreError> {
        let now = self.now();
        let value = self
            .data
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value);
        Ok((value, now))
    }

    fn set_if_not_exists_with_ttl(
        &mut self,
        key: &str,
        value: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.now();
        self.maybe_clean_expired(now);

        match self.data.get(key) {
            Some(entry) if entry.is_live(now) => Ok(false),
            // Missing or expired: create
            _ => {
                let expires_at = Self::expires_at(now, ttl);
                self.data.insert(key.to_string(), Entry { value, expires_at });
                Ok(true)
            }
        }
    }

    fn compare_and_set_with_ttl(
        &mut self,
        key: &str,
        old: i64,
        new: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.now();
        self.maybe_clean_expired(now);

        match self.data.get(key) {
            Some(entry) if entry.is_live(now) && entry.value == old => {
                let expires_at = Self::expires_at(now, ttl);
                self.data
                    .insert(key.to_string(), Entry { value: new, expires_at });
                Ok(true)
            }
            // Live with another value, expired, or missing
            _ => Ok(false),
        }
    }
}

impl<C: Clock> MemoryStoreBuilder<C> {
    /// Set the expected number of unique keys.
    ///
    /// The store allocates 30% more space up front to reduce rehashing.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the interval between sweeps of expired entries.
    ///
    /// Shorter intervals mean tighter memory usage at a higher CPU cost.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Use `clock` as the store's authoritative time source.
    ///
    /// The default is [`SystemClock`]; tests typically substitute a
    /// [`ManualClock`](crate::ManualClock).
    pub fn clock<D: Clock>(self, clock: D) -> MemoryStoreBuilder<D> {
        MemoryStoreBuilder {
            capacity: self.capacity,
            cleanup_interval: self.cleanup_interval,
            clock,
        }
    }

    /// Build the MemoryStore with the configured settings.
    pub fn build(self) -> MemoryStore<C> {
        let first_cleanup = self.clock.now_ns() + self.cleanup_interval.as_nanos() as i64;
        MemoryStore {
            data: HashMap::with_capacity(
                (self.capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
            ),
            clock: self.clock,
            last_now: 0,
            next_cleanup: first_cleanup,
            cleanup_interval: self.cleanup_interval.as_nanos() as i64,
        }
    }
}
