//! Read-through cache of principals keyed by id.
//!
//! Used on the read paths (token validation, authorization). Login and
//! refresh always read the directory, and every write made through the
//! orchestrator invalidates the entry.

use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use warden_core::config::AuthConfig;
use warden_entity::Principal;

#[derive(Clone)]
pub struct PrincipalCache {
    inner: Cache<Uuid, Principal>,
}

impl std::fmt::Debug for PrincipalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl PrincipalCache {
    pub fn new(config: &AuthConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.principal_cache_capacity)
            .time_to_live(Duration::from_secs(config.principal_cache_ttl_seconds))
            .build();
        Self { inner }
    }

    pub async fn get(&self, id: Uuid) -> Option<Principal> {
        self.inner.get(&id).await
    }

    pub async fn insert(&self, principal: Principal) {
        self.inner.insert(principal.id, principal).await;
    }

    pub async fn invalidate(&self, id: Uuid) {
        self.inner.invalidate(&id).await;
    }
}
