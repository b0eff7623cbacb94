//! Redis-backed store adapter for the `throttlemesh` rate limiter
//!
//! Implements the [`Store`] contract on top of a shared Redis instance so
//! that many processes enforce one limit consistently:
//!
//! - the authoritative clock is the Redis server's `TIME`
//! - set-if-absent is a single atomic `SET NX PX`
//! - compare-and-set runs as a server-side Lua script, so the check and the
//!   write are indivisible from the perspective of all other clients
//!
//! Transient server conditions are recovered inside the adapter: a script
//! evicted from the server's script cache is reloaded and the call retried
//! once, and (when enabled) a read-only error after a failover triggers one
//! reconnect-and-retry. Anything else propagates to the engine's caller
//! unchanged.
//!
//! # Example
//!
//! ```no_run
//! use throttlemesh::{Rate, RateLimiter};
//! use throttlemesh_redis::RedisStore;
//!
//! let client = redis::Client::open("redis://127.0.0.1/")?;
//! let store = RedisStore::builder(client)
//!     .key_prefix("myapp:ratelimit:")
//!     .reconnect_on_readonly(true)
//!     .build()?;
//!
//! // 300 requests per minute with a burst of 15
//! let mut limiter = RateLimiter::new(store, Rate::per_minute(300), 14);
//! let (limited, info) = limiter.limit("user:42", 1)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use redis::{Client, Commands, Connection, ErrorKind, RedisError};
use std::time::Duration;
use throttlemesh::{Store, StoreError};

/// Compare-and-set with TTL reset, atomic on the server side.
///
/// Returns 1 when the value was swapped, 0 when the current value does not
/// match, and -1 when the key does not exist at all (the caller turns the
/// last two into a plain `false`).
const CAS_SCRIPT: &str = r#"
local v = redis.call('get', KEYS[1])
if v == false then
  return -1
end
if v ~= ARGV[1] then
  return 0
end
redis.call('psetex', KEYS[1], ARGV[3], ARGV[2])
return 1
"#;

const DEFAULT_KEY_PREFIX: &str = "throttlemesh:";

/// [`Store`] implementation backed by Redis.
///
/// All timestamps and stored values are integer nanoseconds since the Unix
/// epoch; TTLs are applied with millisecond precision. Keys are namespaced
/// with a configurable prefix so several limiters can share one database.
pub struct RedisStore {
    client: Client,
    conn: Connection,
    key_prefix: String,
    // SHA of CAS_SCRIPT as loaded into the server's script cache
    cas_sha: Option<String>,
    reconnect_on_readonly: bool,
}

/// Builder for configuring a [`RedisStore`]
pub struct RedisStoreBuilder {
    client: Client,
    key_prefix: String,
    reconnect_on_readonly: bool,
}

impl RedisStore {
    /// Create a store with the default key prefix and no read-only
    /// reconnect handling.
    pub fn new(client: Client) -> Result<Self, StoreError> {
        Self::builder(client).build()
    }

    /// Create a new builder for configuring a RedisStore.
    pub fn builder(client: Client) -> RedisStoreBuilder {
        RedisStoreBuilder {
            client,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            reconnect_on_readonly: false,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Whether `err` should be answered by reconnecting and retrying once.
    ///
    /// After a failover the old primary serves writes with READONLY until
    /// clients re-resolve the address by reconnecting.
    fn should_reconnect(&self, err: &RedisError, already_retried: bool) -> bool {
        self.reconnect_on_readonly && !already_retried && err.kind() == ErrorKind::ReadOnly
    }

    fn reconnect(&mut self) -> Result<(), StoreError> {
        tracing::warn!("redis answered READONLY, reconnecting");
        self.conn = self.client.get_connection().map_err(StoreError::new)?;
        Ok(())
    }

    /// SHA of the CAS script, loading it into the server cache on first use.
    fn cas_sha(&mut self) -> Result<String, StoreError> {
        if let Some(sha) = &self.cas_sha {
            return Ok(sha.clone());
        }

        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(CAS_SCRIPT)
            .query(&mut self.conn)
            .map_err(StoreError::new)?;
        self.cas_sha = Some(sha.clone());
        Ok(sha)
    }
}

impl Store for RedisStore {
    fn get_with_time(&mut self, key: &str) -> Result<(Option<i64>, i64), StoreError> {
        // TIME answers (seconds since epoch, microseconds within second)
        let (secs, micros): (i64, i64) = redis::cmd("TIME")
            .query(&mut self.conn)
            .map_err(StoreError::new)?;
        let now = (secs * 1_000_000 + micros) * 1_000;

        let full_key = self.full_key(key);
        let value: Option<i64> = self.conn.get(&full_key).map_err(StoreError::new)?;

        Ok((value, now))
    }

    fn set_if_not_exists_with_ttl(
        &mut self,
        key: &str,
        value: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let full_key = self.full_key(key);
        let ttl_ms = ttl_millis(ttl);
        let mut reconnected = false;

        loop {
            let result: Result<Option<String>, RedisError> = redis::cmd("SET")
                .arg(&full_key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query(&mut self.conn);

            match result {
                Ok(reply) => return Ok(reply.is_some()),
                Err(e) if self.should_reconnect(&e, reconnected) => {
                    self.reconnect()?;
                    reconnected = true;
                }
                Err(e) => return Err(StoreError::new(e)),
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
        let full_key = self.full_key(key);
        let ttl_ms = ttl_millis(ttl);
        let mut reloaded = false;
        let mut reconnected = false;

        loop {
            let sha = self.cas_sha()?;
            let result: Result<i64, RedisError> = redis::cmd("EVALSHA")
                .arg(&sha)
                .arg(1)
                .arg(&full_key)
                .arg(old)
                .arg(new)
                .arg(ttl_ms)
                .query(&mut self.conn);

            match result {
                Ok(1) => return Ok(true),
                // 0: value mismatch, -1: key does not exist
                Ok(_) => return Ok(false),
                Err(e) if e.kind() == ErrorKind::NoScriptError && !reloaded => {
                    // The server's script cache was flushed; load the
                    // script again and retry once.
                    tracing::debug!("CAS script missing from redis script cache, reloading");
                    self.cas_sha = None;
                    reloaded = true;
                }
                Err(e) if self.should_reconnect(&e, reconnected) => {
                    self.reconnect()?;
                    reconnected = true;
                }
                Err(e) => return Err(StoreError::new(e)),
            }
        }
    }
}

impl RedisStoreBuilder {
    /// Namespace every key with `prefix`. Defaults to `"throttlemesh:"`.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Reconnect and retry once when the server answers READONLY, as the
    /// demoted side of a failover does. Off by default.
    pub fn reconnect_on_readonly(mut self, enabled: bool) -> Self {
        self.reconnect_on_readonly = enabled;
        self
    }

    /// Build the RedisStore, establishing its connection.
    pub fn build(self) -> Result<RedisStore, StoreError> {
        let conn = self.client.get_connection().map_err(StoreError::new)?;
        Ok(RedisStore {
            client: self.client,
            conn,
            key_prefix: self.key_prefix,
            cas_sha: None,
            reconnect_on_readonly: self.reconnect_on_readonly,
        })
    }
}

/// TTL in milliseconds for PX/PSETEX. A duration that rounds to zero is
/// clamped up to 1 ms, since a zero expiration is an error in Redis.
fn ttl_millis(ttl: Duration) -> i64 {
    let ms = ttl.as_millis() as i64;
    if ms == 0 { 1 } else { ms }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_down_to_milliseconds() {
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(ttl_millis(Duration::from_nanos(2_500_000)), 2);
    }

    #[test]
    fn sub_millisecond_ttl_is_clamped_to_one() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_nanos(100)), 1);
        assert_eq!(ttl_millis(Duration::from_nanos(999_999)), 1);
    }
}
