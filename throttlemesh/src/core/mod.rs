//! Core components of the throttlemesh rate limiting library
//!
//! This module contains the fundamental building blocks:
//! - [`rate`]: Rate specification and emission intervals
//! - [`rate_limiter`]: The GCRA decision engine
//! - [`store`]: The atomic store contract and the in-memory reference store
//! - [`clock`]: Time sources for store implementations

pub mod clock;
pub mod rate;
pub mod rate_limiter;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate::Rate;
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use store::{MemoryStore, MemoryStoreBuilder, Store, StoreError};

/// Errors that can occur during rate limiting operations
///
/// A rejected request is not an error: it is reported as a normal
/// `(limited, info)` result. Only store malfunction is modeled as an
/// exceptional condition.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Every write attempt lost the race to a concurrent writer (or the
    /// store persistently refused the write). The caller decides whether to
    /// fail the request, fail open, or fail closed.
    #[error("failed to store updated rate limit data for key '{key}' after {attempts} attempts")]
    StoreUpdateFailed {
        /// The key whose state could not be committed
        key: String,
        /// How many attempts were made before giving up
        attempts: u32,
    },
    /// The store reported a non-transient failure (network unreachable,
    /// auth failure, ...). Propagated unchanged from the store call.
    #[error(transparent)]
    Store(#[from] StoreError),
}
