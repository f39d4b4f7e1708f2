//! Key-value store capability backing revocation records, counters, and
//! one-time state.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for store backends (Redis or in-memory).
///
/// Values are plain strings. Every compound operation is atomic with respect
/// to other calls on the same key, which is what the rotation, lockout, and
/// OAuth state flows rely on. Backends are responsible for key prefixing.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value with a TTL, overwriting any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Set a value only if the key does not already exist (NX).
    /// Returns `true` if the value was set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool>;

    /// Replace `expected` with `new` atomically, preserving the key's TTL.
    /// Returns `true` only for the caller that observed `expected`.
    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> AppResult<bool>;

    /// Overwrite the value of an existing key, preserving its TTL.
    /// Returns `false` (and writes nothing) when the key is absent.
    async fn replace_existing(&self, key: &str, value: &str) -> AppResult<bool>;

    /// Get and delete a value in one step. At most one caller receives it.
    async fn take(&self, key: &str) -> AppResult<Option<String>>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Increment a counter, setting `window` as its expiry only when the
    /// counter is created. Returns the new count.
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<u64>;

    /// Add a member to a set, refreshing the set's expiry to `ttl`.
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> AppResult<()>;

    /// Remove a member from a set. Returns whether it was present.
    async fn set_remove(&self, key: &str, member: &str) -> AppResult<bool>;

    /// List the members of a set (empty if absent).
    async fn set_members(&self, key: &str) -> AppResult<Vec<String>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
