//! Fixed-window rate limiting per `(route, identity)`.

use std::time::Duration;

use tracing::warn;

use warden_cache::keys;
use warden_core::config::SecurityConfig;

use crate::error::{AuthError, AuthResult};
use crate::revocation::RevocationStore;

pub const ROUTE_REGISTER: &str = "register";
pub const ROUTE_LOGIN: &str = "login";
pub const ROUTE_REFRESH: &str = "refresh";
pub const ROUTE_OAUTH: &str = "oauth";

/// Counts requests in the store; a store failure denies the request.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: RevocationStore,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: RevocationStore, config: &SecurityConfig) -> Self {
        Self {
            store,
            limit: config.rate_limit_requests,
            window: config.rate_limit_window(),
        }
    }

    /// Count one request, failing with [`AuthError::RateLimited`] past the limit.
    pub async fn check(&self, route: &str, identity: &str) -> AuthResult<()> {
        let count = self
            .store
            .increment_window_counter(&keys::rate_limit(route, identity), self.window)
            .await?;

        if count > u64::from(self.limit) {
            warn!(route, count, "Rate limit exceeded");
            return Err(AuthError::RateLimited);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_cache::StoreManager;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(
            RevocationStore::new(Arc::new(StoreManager::in_memory())),
            &SecurityConfig {
                rate_limit_requests: limit,
                ..SecurityConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_limit_applies_per_route_and_identity() {
        let limiter = limiter(2);
        limiter.check(ROUTE_LOGIN, "a@example.com").await.unwrap();
        limiter.check(ROUTE_LOGIN, "A@example.com").await.unwrap();
        assert_eq!(
            limiter.check(ROUTE_LOGIN, "a@example.com").await,
            Err(AuthError::RateLimited)
        );

        limiter.check(ROUTE_LOGIN, "b@example.com").await.unwrap();
        limiter.check(ROUTE_REGISTER, "a@example.com").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets() {
        let limiter = limiter(1);
        limiter.check(ROUTE_REFRESH, "p1").await.unwrap();
        assert!(limiter.check(ROUTE_REFRESH, "p1").await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.check(ROUTE_REFRESH, "p1").await.unwrap();
    }
}
