//! Redis store implementation.
//!
//! Single-command primitives map onto native commands (`SET … NX`,
//! `SET … XX KEEPTTL`, `GETDEL`). Compound primitives run as Lua scripts
//! so they stay atomic across nodes.

use std::time::Duration;

use async_trait::async_trait;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_core::traits::KeyValueStore;

use super::client::RedisClient;

/// Compare-and-swap preserving the TTL.
///
/// KEYS[1] = key
/// ARGV[1] = expected value
/// ARGV[2] = new value
///
/// Returns 1 when swapped, 0 otherwise.
const COMPARE_AND_SWAP_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
        return 1
    end
    return 0
"#;

/// Fixed-window counter.
///
/// KEYS[1] = counter key
/// ARGV[1] = window in milliseconds
///
/// The expiry is only set when the increment created the key.
const INCR_WINDOW_SCRIPT: &str = r#"
    local count = redis.call('INCR', KEYS[1])
    if count == 1 then
        redis.call('PEXPIRE', KEYS[1], ARGV[1])
    end
    return count
"#;

/// Redis-backed store provider.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: RedisClient,
}

impl RedisStore {
    /// Create a new Redis store provider.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }
}

/// Redis rejects a zero expiry, so round sub-millisecond TTLs up.
fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("GET")
            .arg(self.client.prefixed_key(key))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let _: () = redis::cmd("SET")
            .arg(self.client.prefixed_key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let result: Option<String> = redis::cmd("SET")
            .arg(self.client.prefixed_key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(result.is_some())
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let swapped: i64 = redis::Script::new(COMPARE_AND_SWAP_SCRIPT)
            .key(self.client.prefixed_key(key))
            .arg(expected)
            .arg(new)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(swapped == 1)
    }

    async fn replace_existing(&self, key: &str, value: &str) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let result: Option<String> = redis::cmd("SET")
            .arg(self.client.prefixed_key(key))
            .arg(value)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(result.is_some())
    }

    async fn take(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("GETDEL")
            .arg(self.client.prefixed_key(key))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let removed: i64 = redis::cmd("DEL")
            .arg(self.client.prefixed_key(key))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        let count: i64 = redis::Script::new(INCR_WINDOW_SCRIPT)
            .key(self.client.prefixed_key(key))
            .arg(ttl_millis(window))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(count.max(0) as u64)
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let _: () = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(&full_key)
            .arg(member)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&full_key)
            .arg(ttl_millis(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let removed: i64 = redis::cmd("SREM")
            .arg(self.client.prefixed_key(key))
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        let mut conn = self.client.conn_mut();
        redis::cmd("SMEMBERS")
            .arg(self.client.prefixed_key(key))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }
}
