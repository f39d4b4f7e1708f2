//! Revocation facade over the injected key-value store.
//!
//! Every refresh token has exactly one record, `valid` or `revoked`,
//! living as long as the token itself. Records are flipped, never
//! deleted, so a revoked token can never be mistaken for an unknown one
//! while it could still verify.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_cache::keys;
use warden_core::traits::KeyValueStore;

use crate::error::{AuthError, AuthResult};

const VALID: &str = "valid";
const REVOKED: &str = "revoked";

/// State of a refresh token's revocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    Valid,
    Revoked,
    /// No record: never issued, or already past its lifetime.
    NotFound,
}

impl RevocationStatus {
    /// Only a `valid` record lets a refresh proceed.
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

/// One-time OAuth state payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Token lifecycle operations on top of [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct RevocationStore {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationStore {
    /// Wrap a backend. Every call fails closed with [`AuthError::StoreUnavailable`].
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Record a freshly issued refresh token as valid.
    pub async fn put_revocation(
        &self,
        principal_id: Uuid,
        token_id: &str,
        ttl: Duration,
    ) -> AuthResult<()> {
        self.store
            .set(&keys::refresh_token(principal_id, token_id), VALID, ttl)
            .await
            .map_err(AuthError::store)?;
        self.store
            .set_add(&keys::principal_tokens(principal_id), token_id, ttl)
            .await
            .map_err(AuthError::store)?;
        debug!(principal_id = %principal_id, "Refresh token recorded");
        Ok(())
    }

    /// Read a token's record.
    ///
    /// A value other than `valid` or `revoked` is treated as revoked.
    pub async fn check_revocation(
        &self,
        principal_id: Uuid,
        token_id: &str,
    ) -> AuthResult<RevocationStatus> {
        let value = self
            .store
            .get(&keys::refresh_token(principal_id, token_id))
            .await
            .map_err(AuthError::store)?;

        Ok(match value.as_deref() {
            None => RevocationStatus::NotFound,
            Some(VALID) => RevocationStatus::Valid,
            Some(REVOKED) => RevocationStatus::Revoked,
            Some(other) => {
                warn!(principal_id = %principal_id, value = other, "Unrecognised revocation record");
                RevocationStatus::Revoked
            }
        })
    }

    /// Mark a token revoked, keeping its record for the rest of its lifetime.
    ///
    /// When the record is already gone but the token could still verify,
    /// a tombstone covering `remaining` is written.
    pub async fn revoke(
        &self,
        principal_id: Uuid,
        token_id: &str,
        remaining: Duration,
    ) -> AuthResult<()> {
        let key = keys::refresh_token(principal_id, token_id);
        let replaced = self
            .store
            .replace_existing(&key, REVOKED)
            .await
            .map_err(AuthError::store)?;

        if !replaced && !remaining.is_zero() {
            self.store
                .set(&key, REVOKED, remaining)
                .await
                .map_err(AuthError::store)?;
        }

        self.store
            .set_remove(&keys::principal_tokens(principal_id), token_id)
            .await
            .map_err(AuthError::store)?;
        info!(principal_id = %principal_id, "Refresh token revoked");
        Ok(())
    }

    /// Atomically flip `valid` to `revoked`. Exactly one concurrent caller wins.
    pub async fn consume(&self, principal_id: Uuid, token_id: &str) -> AuthResult<bool> {
        let won = self
            .store
            .compare_and_swap(&keys::refresh_token(principal_id, token_id), VALID, REVOKED)
            .await
            .map_err(AuthError::store)?;

        if won {
            self.store
                .set_remove(&keys::principal_tokens(principal_id), token_id)
                .await
                .map_err(AuthError::store)?;
        }
        Ok(won)
    }

    /// Revoke every refresh token currently valid for a principal.
    pub async fn revoke_all(&self, principal_id: Uuid) -> AuthResult<usize> {
        let set_key = keys::principal_tokens(principal_id);
        let members = self
            .store
            .set_members(&set_key)
            .await
            .map_err(AuthError::store)?;

        let mut revoked = 0;
        for token_id in &members {
            let flipped = self
                .store
                .replace_existing(&keys::refresh_token(principal_id, token_id), REVOKED)
                .await
                .map_err(AuthError::store)?;
            self.store
                .set_remove(&set_key, token_id)
                .await
                .map_err(AuthError::store)?;
            if flipped {
                revoked += 1;
            }
        }

        info!(principal_id = %principal_id, count = revoked, "Revoked all refresh tokens");
        Ok(revoked)
    }

    /// Fixed-window counter; the window starts with the first increment.
    pub async fn increment_window_counter(&self, key: &str, window: Duration) -> AuthResult<u64> {
        self.store
            .incr_window(key, window)
            .await
            .map_err(AuthError::store)
    }

    /// Store an OAuth state for `ttl`. Reusing a live state value is an error.
    pub async fn put_oauth_state(&self, payload: &OAuthState, ttl: Duration) -> AuthResult<()> {
        let value = encode(payload)?;
        let inserted = self
            .store
            .set_nx(&keys::oauth_state(&payload.state), &value, ttl)
            .await
            .map_err(AuthError::store)?;
        if !inserted {
            return Err(AuthError::Internal("OAuth state collision".into()));
        }
        Ok(())
    }

    /// Destructively read an OAuth state. A second take returns `None`.
    pub async fn take_oauth_state(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        let value = self
            .store
            .take(&keys::oauth_state(state))
            .await
            .map_err(AuthError::store)?;
        Ok(value.and_then(|raw| decode(&raw)))
    }

    /// Cache a principal's session snapshot for the refresh lifetime.
    pub async fn put_session<T: Serialize>(
        &self,
        principal_id: Uuid,
        session: &T,
        ttl: Duration,
    ) -> AuthResult<()> {
        let value = encode(session)?;
        self.store
            .set(&keys::principal_session(principal_id), &value, ttl)
            .await
            .map_err(AuthError::store)
    }

    /// Drop the cached snapshot. Missing entries are not an error.
    pub async fn clear_session(&self, principal_id: Uuid) -> AuthResult<()> {
        self.store
            .delete(&keys::principal_session(principal_id))
            .await
            .map_err(AuthError::store)?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> AuthResult<String> {
    serde_json::to_string(value).map_err(|e| AuthError::Internal(format!("Encoding failed: {e}")))
}

fn decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Discarding unreadable store payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_cache::StoreManager;

    const DAY: Duration = Duration::from_secs(86_400);

    fn store() -> RevocationStore {
        RevocationStore::new(Arc::new(StoreManager::in_memory()))
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let store = store();
        let id = Uuid::new_v4();

        assert_eq!(
            store.check_revocation(id, "t1").await.unwrap(),
            RevocationStatus::NotFound
        );
        store.put_revocation(id, "t1", DAY).await.unwrap();
        assert_eq!(
            store.check_revocation(id, "t1").await.unwrap(),
            RevocationStatus::Valid
        );
        store.revoke(id, "t1", DAY).await.unwrap();
        assert_eq!(
            store.check_revocation(id, "t1").await.unwrap(),
            RevocationStatus::Revoked
        );
    }

    #[tokio::test]
    async fn test_revoke_writes_tombstone_for_missing_record() {
        let store = store();
        let id = Uuid::new_v4();

        store.revoke(id, "ghost", DAY).await.unwrap();
        assert_eq!(
            store.check_revocation(id, "ghost").await.unwrap(),
            RevocationStatus::Revoked
        );

        store.revoke(id, "expired", Duration::ZERO).await.unwrap();
        assert_eq!(
            store.check_revocation(id, "expired").await.unwrap(),
            RevocationStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_consume_has_single_winner() {
        let store = store();
        let id = Uuid::new_v4();
        store.put_revocation(id, "t1", DAY).await.unwrap();

        let attempts = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.consume(id, "t1").await.unwrap() })
        });
        let results = futures::future::join_all(attempts).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

        assert_eq!(winners, 1);
        assert!(!store.consume(id, "t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all_counts_active_tokens() {
        let store = store();
        let id = Uuid::new_v4();
        for tid in ["a", "b", "c"] {
            store.put_revocation(id, tid, DAY).await.unwrap();
        }
        store.consume(id, "b").await.unwrap();

        assert_eq!(store.revoke_all(id).await.unwrap(), 2);
        for tid in ["a", "b", "c"] {
            assert_eq!(
                store.check_revocation(id, tid).await.unwrap(),
                RevocationStatus::Revoked
            );
        }
        assert_eq!(store.revoke_all(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let store = store();
        let state = OAuthState {
            state: "s-1".into(),
            redirect_to: Some("/dashboard".into()),
            created_at: Utc::now(),
        };
        store
            .put_oauth_state(&state, Duration::from_secs(900))
            .await
            .unwrap();

        let (a, b) = tokio::join!(store.take_oauth_state("s-1"), store.take_oauth_state("s-1"));
        let taken: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();
        assert_eq!(taken, vec![state]);
    }

    #[tokio::test]
    async fn test_session_cache_cleared() {
        let backend = Arc::new(StoreManager::in_memory());
        let store = RevocationStore::new(backend.clone());
        let id = Uuid::new_v4();
        let key = keys::principal_session(id);

        store
            .put_session(id, &serde_json::json!({"email": "a@example.com"}), DAY)
            .await
            .unwrap();
        let cached = backend.get(&key).await.unwrap().unwrap();
        assert!(cached.contains("a@example.com"));

        store.clear_session(id).await.unwrap();
        assert!(backend.get(&key).await.unwrap().is_none());
        store.clear_session(id).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_revoke_all_races_with_issue() {
        let backend = Arc::new(StoreManager::in_memory());
        let store = RevocationStore::new(backend.clone());
        let id = Uuid::new_v4();
        let ids: Vec<String> = (0..64).map(|n| format!("t{n}")).collect();

        let issuers = ids.iter().cloned().map(|tid| {
            let store = store.clone();
            tokio::spawn(async move { store.put_revocation(id, &tid, DAY).await.unwrap() })
        });
        let revokers = (0..4).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.revoke_all(id).await.unwrap() })
        });
        let (issued, revoked) = tokio::join!(
            futures::future::join_all(issuers),
            futures::future::join_all(revokers)
        );
        assert!(issued.iter().all(Result::is_ok));
        assert!(revoked.iter().all(Result::is_ok));

        // A token that survived the sweep must still be listed for the next one.
        let listed = backend
            .set_members(&keys::principal_tokens(id))
            .await
            .unwrap();
        for tid in &ids {
            match store.check_revocation(id, tid).await.unwrap() {
                RevocationStatus::Valid => assert!(listed.contains(tid), "{tid} valid but unlisted"),
                RevocationStatus::Revoked => assert!(!listed.contains(tid)),
                RevocationStatus::NotFound => panic!("{tid} lost its record"),
            }
        }

        store.revoke_all(id).await.unwrap();
        for tid in &ids {
            assert_eq!(
                store.check_revocation(id, tid).await.unwrap(),
                RevocationStatus::Revoked
            );
        }
    }
}
