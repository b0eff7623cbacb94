//! # ThrottleMesh
//!
//! A distributed GCRA (Generic Cell Rate Algorithm) rate limiter for Rust.
//!
//! ## Overview
//!
//! ThrottleMesh decides, for a caller-supplied key and a requested quantity,
//! whether a request should be admitted, and reports how much capacity
//! remains and when the caller may retry. Many independent processes can
//! enforce one limit consistently by sharing state through a common
//! [`Store`]:
//!
//! - **Cluster-wide enforcement**: state lives in the store, not the process
//! - **Smooth traffic shaping**: GCRA tracks a single theoretical arrival
//!   time per key instead of a counter
//! - **Lock-free coordination**: optimistic compare-and-set with bounded
//!   retries, no cross-process locking
//! - **Memory efficiency**: one integer plus a TTL per key
//!
//! ## Quick Start
//!
//! ```
//! use throttlemesh::{MemoryStore, Rate, RateLimiter};
//!
//! // 1 request per second with a burst of 4 (5 requests back-to-back)
//! let mut limiter = RateLimiter::new(MemoryStore::new(), Rate::per_second(1), 4);
//!
//! let (limited, result) = limiter.limit("user:123", 1)?;
//!
//! if limited {
//!     match result.retry_after {
//!         Some(wait) => println!("Rate limited! Retry in {:?}", wait),
//!         None => println!("Request can never be satisfied at this quantity"),
//!     }
//! } else {
//!     println!("Request allowed! Remaining: {}", result.remaining);
//! }
//! # Ok::<(), throttlemesh::RateLimitError>(())
//! ```
//!
//! ## Stores
//!
//! The engine is generic over the [`Store`] contract: an authoritative
//! clock read plus two atomic conditional writes with expiration. Any
//! backend that can satisfy the contract qualifies.
//!
//! [`MemoryStore`] is the bundled reference implementation, suitable for
//! tests and single-process use:
//!
//! ```
//! use throttlemesh::MemoryStore;
//! use std::time::Duration;
//!
//! let store = MemoryStore::builder()
//!     .capacity(100_000)
//!     .cleanup_interval(Duration::from_secs(300))
//!     .build();
//! ```
//!
//! For cluster-wide enforcement, use a shared backend such as the
//! `throttlemesh-redis` adapter.
//!
//! ## Concurrency
//!
//! The engine holds no locks and keeps no state between calls. Competing
//! writers for the same key are resolved by the store's compare-and-set:
//! exactly one writer wins each race, the others re-read fresh state and
//! retry, bounded at 10 attempts before
//! [`RateLimitError::StoreUpdateFailed`] is returned.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing in [`MemoryStore`]

pub mod core;

pub use core::{
    Clock, ManualClock, MemoryStore, MemoryStoreBuilder, Rate, RateLimitError, RateLimitResult,
    RateLimiter, Store, StoreError, SystemClock,
};
