//! The atomic store contract and the in-memory reference store
//!
//! Per-key state is a single integer (the theoretical arrival time, in
//! nanoseconds) plus an expiration. The engine delegates all ownership of
//! that state to a [`Store`]: any backing technology qualifies if it can
//! read the value together with an authoritative timestamp and perform the
//! two conditional writes atomically.

use std::time::Duration;

mod memory;

pub use memory::{MemoryStore, MemoryStoreBuilder};

#[cfg(test)]
mod tests;

/// A non-transient failure reported by a [`Store`] implementation.
///
/// Opaque by design: the engine treats every store failure the same way and
/// never inspects the underlying error, so adapters classify their own
/// transient conditions (and recover from them) before anything reaches
/// this type.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct StoreError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl StoreError {
    /// Wrap an adapter-specific error.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        StoreError(source.into())
    }
}

/// Atomic state storage shared by every process enforcing one limit
///
/// Timestamps and stored values are nanoseconds since the Unix epoch, read
/// and written exclusively through the store's own clock domain.
///
/// `compare_and_set_with_ttl` and `set_if_not_exists_with_ttl` must be
/// linearizable with respect to each other for a given key; that atomicity
/// is the only synchronization the engine relies on.
pub trait Store {
    /// Returns the currently stored value for `key` (or `None`) together
    /// with the current time from the store's authoritative clock.
    ///
    /// The two reads need not be a single atomic step, but the timestamp
    /// must come from the same clock domain used to interpret stored
    /// values, and must never regress across sequential calls from the
    /// same process.
    fn get_with_time(&mut self, key: &str) -> Result<(Option<i64>, i64), StoreError>;

    /// Atomically creates `key` only if it does not already exist, with an
    /// expiration of `ttl`. Returns whether the create happened.
    ///
    /// A `ttl` that rounds to zero in the store's granularity must be
    /// clamped up to the smallest positive representable unit.
    fn set_if_not_exists_with_ttl(
        &mut self,
        key: &str,
        value: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Atomically replaces the value of `key` with `new` and resets its
    /// expiration to `ttl`, but only if the current value equals `old`.
    /// Returns whether the swap happened.
    ///
    /// A missing key is `Ok(false)`, not an error: the engine uses that
    /// outcome to retry via `set_if_not_exists_with_ttl` on fresh state.
    fn compare_and_set_with_ttl(
        &mut self,
        key: &str,
        old: i64,
        new: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}
