//! # warden-cache
//!
//! Key-value store backends for Warden's revocation records, counters, and
//! one-time OAuth state. Supports two modes:
//!
//! - **memory**: In-process store using [dashmap](https://crates.io/crates/dashmap)
//! - **redis**: Redis-backed store using the [redis](https://crates.io/crates/redis) crate
//!
//! The backend is selected at runtime based on configuration and wrapped
//! in a [`StoreManager`] that bounds every call with a timeout.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::StoreManager;
