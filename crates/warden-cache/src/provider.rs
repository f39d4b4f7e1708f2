//! Store manager that dispatches to the configured backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use warden_core::config::StoreConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::KeyValueStore;

/// Store manager that wraps the configured backend.
///
/// The backend is selected at construction time based on configuration.
/// Every call is bounded by the configured operation timeout; an expired
/// bound is reported as a cache error.
#[derive(Debug, Clone)]
pub struct StoreManager {
    inner: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl StoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: Arc<dyn KeyValueStore> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis store provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisStore::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory store provider");
                Arc::new(crate::memory::MemoryStore::new(&config.memory))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown store provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self {
            inner,
            timeout: config.operation_timeout(),
        })
    }

    /// Create a store manager from an existing backend (for testing).
    pub fn from_store(store: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self {
            inner: store,
            timeout,
        }
    }

    /// In-memory store with default settings.
    #[cfg(feature = "memory")]
    pub fn in_memory() -> Self {
        let config = StoreConfig::default();
        Self::from_store(
            Arc::new(crate::memory::MemoryStore::new(&config.memory)),
            config.operation_timeout(),
        )
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AppResult<T>> + Send,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store operation timed out"
                );
                Err(AppError::cache(format!(
                    "Store operation '{operation}' timed out"
                )))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for StoreManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.bounded("set", self.inner.set(key, value, ttl)).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.bounded("set_nx", self.inner.set_nx(key, value, ttl))
            .await
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> AppResult<bool> {
        self.bounded(
            "compare_and_swap",
            self.inner.compare_and_swap(key, expected, new),
        )
        .await
    }

    async fn replace_existing(&self, key: &str, value: &str) -> AppResult<bool> {
        self.bounded("replace_existing", self.inner.replace_existing(key, value))
            .await
    }

    async fn take(&self, key: &str) -> AppResult<Option<String>> {
        self.bounded("take", self.inner.take(key)).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<u64> {
        self.bounded("incr_window", self.inner.incr_window(key, window))
            .await
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> AppResult<()> {
        self.bounded("set_add", self.inner.set_add(key, member, ttl))
            .await
    }

    async fn set_remove(&self, key: &str, member: &str) -> AppResult<bool> {
        self.bounded("set_remove", self.inner.set_remove(key, member))
            .await
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        self.bounded("set_members", self.inner.set_members(key))
            .await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.bounded("health_check", self.inner.health_check())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use warden_core::ErrorKind;

    /// Backend whose calls never complete.
    #[derive(Debug)]
    struct StalledStore;

    #[async_trait]
    impl KeyValueStore for StalledStore {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            std::future::pending().await
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
            std::future::pending().await
        }
        async fn set_nx(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn compare_and_swap(&self, _k: &str, _e: &str, _n: &str) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn replace_existing(&self, _key: &str, _value: &str) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn take(&self, _key: &str) -> AppResult<Option<String>> {
            std::future::pending().await
        }
        async fn delete(&self, _key: &str) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn incr_window(&self, _key: &str, _window: Duration) -> AppResult<u64> {
            std::future::pending().await
        }
        async fn set_add(&self, _key: &str, _member: &str, _ttl: Duration) -> AppResult<()> {
            std::future::pending().await
        }
        async fn set_remove(&self, _key: &str, _member: &str) -> AppResult<bool> {
            std::future::pending().await
        }
        async fn set_members(&self, _key: &str) -> AppResult<Vec<String>> {
            std::future::pending().await
        }
        async fn health_check(&self) -> AppResult<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_times_out_as_cache_error() {
        let manager = StoreManager::from_store(Arc::new(StalledStore), Duration::from_millis(50));
        let err = manager.get("anything").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let config = StoreConfig {
            provider: "etcd".to_string(),
            ..StoreConfig::default()
        };
        assert!(StoreManager::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let manager = StoreManager::in_memory();
        manager.set("k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(manager.take("k").await.unwrap().as_deref(), Some("v"));
    }
}
