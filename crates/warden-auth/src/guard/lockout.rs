//! Lockout state machine.
//!
//! A principal is locked once its failed-attempt counter reaches the
//! configured maximum. Locks are never lifted by a background job: an
//! elapsed `locked_until` is detected on the next login attempt and the
//! counter is reset at that point.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use warden_core::config::SecurityConfig;
use warden_database::PrincipalRepository;
use warden_entity::Principal;

use crate::bounded::directory_call;
use crate::error::{AuthError, AuthResult};

/// Lock status of a principal at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Active { failed_attempts: i32 },
    Locked { until: DateTime<Utc> },
    /// A stored lock whose expiry has passed; the counter is stale.
    LockElapsed,
}

/// Result of recording one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub failed_attempts: i32,
    /// Set when this attempt tripped the lock.
    pub locked_until: Option<DateTime<Utc>>,
}

/// Applies the lockout policy against the directory.
#[derive(Debug, Clone)]
pub struct AccountGuard {
    principals: Arc<dyn PrincipalRepository>,
    max_failed_attempts: i32,
    lockout_duration: chrono::Duration,
    directory_timeout: Duration,
}

impl AccountGuard {
    pub fn new(
        principals: Arc<dyn PrincipalRepository>,
        config: &SecurityConfig,
        directory_timeout: Duration,
    ) -> Self {
        Self {
            principals,
            max_failed_attempts: config.max_failed_attempts,
            lockout_duration: chrono::Duration::minutes(config.lockout_duration_minutes as i64),
            directory_timeout,
        }
    }

    /// Pure evaluation of the stored counters against `now`.
    pub fn evaluate(principal: &Principal, now: DateTime<Utc>) -> LockoutState {
        match principal.locked_until {
            Some(until) if now < until => LockoutState::Locked { until },
            Some(_) => LockoutState::LockElapsed,
            None => LockoutState::Active {
                failed_attempts: principal.failed_login_attempts,
            },
        }
    }

    /// Gate a login attempt: reject while locked, start a fresh window
    /// once a lock has elapsed.
    pub async fn admit(&self, principal: &Principal, now: DateTime<Utc>) -> AuthResult<()> {
        match Self::evaluate(principal, now) {
            LockoutState::Locked { until } => Err(AuthError::AccountLocked { until }),
            LockoutState::LockElapsed => {
                self.reset(principal.id).await?;
                info!(principal_id = %principal.id, "Lock elapsed, failed-attempt counter reset");
                Ok(())
            }
            LockoutState::Active { .. } => Ok(()),
        }
    }

    /// Count a failed attempt and lock when the returned count reaches
    /// the threshold.
    pub async fn record_failure(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<FailureOutcome> {
        let failed_attempts = directory_call(
            self.directory_timeout,
            "increment_failed_attempts",
            self.principals.increment_failed_attempts(principal_id),
        )
        .await?;

        if failed_attempts < self.max_failed_attempts {
            return Ok(FailureOutcome {
                failed_attempts,
                locked_until: None,
            });
        }

        let until = now + self.lockout_duration;
        directory_call(
            self.directory_timeout,
            "set_lock_until",
            self.principals.set_lock_until(principal_id, Some(until)),
        )
        .await?;
        warn!(
            principal_id = %principal_id,
            count = failed_attempts,
            locked_until = %until,
            "Account locked after repeated failed logins"
        );

        Ok(FailureOutcome {
            failed_attempts,
            locked_until: Some(until),
        })
    }

    /// Clear the counter after a successful login.
    pub async fn record_success(&self, principal: &Principal) -> AuthResult<()> {
        if principal.failed_login_attempts == 0 && principal.locked_until.is_none() {
            return Ok(());
        }
        self.reset(principal.id).await
    }

    /// Administrative unlock.
    pub async fn unlock(&self, principal_id: Uuid) -> AuthResult<()> {
        self.reset(principal_id).await?;
        info!(principal_id = %principal_id, "Account unlocked");
        Ok(())
    }

    async fn reset(&self, principal_id: Uuid) -> AuthResult<()> {
        directory_call(
            self.directory_timeout,
            "reset_failed_attempts",
            self.principals.reset_failed_attempts(principal_id),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use warden_database::MemoryDirectory;
    use warden_entity::NewPrincipal;

    async fn setup() -> (AccountGuard, MemoryDirectory, Principal) {
        let directory = MemoryDirectory::new();
        let principal = directory
            .create(&NewPrincipal {
                email: "bob@example.com".into(),
                name: "Bob".into(),
                password_hash: Some("x".into()),
                provider: None,
                provider_subject: None,
                role_id: None,
                verified: false,
            })
            .await
            .unwrap();
        let guard = AccountGuard::new(
            Arc::new(directory.clone()),
            &SecurityConfig::default(),
            Duration::from_secs(5),
        );
        (guard, directory, principal)
    }

    #[test]
    fn test_evaluate_is_pure_timestamp_comparison() {
        let now = Utc::now();
        let mut principal = Principal {
            locked_until: Some(now + ChronoDuration::minutes(1)),
            ..test_principal()
        };
        assert!(matches!(
            AccountGuard::evaluate(&principal, now),
            LockoutState::Locked { .. }
        ));
        assert_eq!(
            AccountGuard::evaluate(&principal, now + ChronoDuration::minutes(1)),
            LockoutState::LockElapsed
        );
        principal.locked_until = None;
        principal.failed_login_attempts = 3;
        assert_eq!(
            AccountGuard::evaluate(&principal, now),
            LockoutState::Active { failed_attempts: 3 }
        );
    }

    #[tokio::test]
    async fn test_fifth_failure_locks() {
        let (guard, directory, principal) = setup().await;
        let now = Utc::now();

        for expected in 1..5 {
            let outcome = guard.record_failure(principal.id, now).await.unwrap();
            assert_eq!(outcome.failed_attempts, expected);
            assert!(outcome.locked_until.is_none());
        }
        let outcome = guard.record_failure(principal.id, now).await.unwrap();
        assert_eq!(outcome.locked_until, Some(now + ChronoDuration::minutes(15)));

        let stored = directory.find_by_id(principal.id).await.unwrap().unwrap();
        assert!(matches!(
            guard.admit(&stored, now).await,
            Err(AuthError::AccountLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_elapsed_lock_resets_counter() {
        let (guard, directory, principal) = setup().await;
        let now = Utc::now();
        for _ in 0..5 {
            guard.record_failure(principal.id, now).await.unwrap();
        }

        let later = now + ChronoDuration::minutes(16);
        let stored = directory.find_by_id(principal.id).await.unwrap().unwrap();
        guard.admit(&stored, later).await.unwrap();

        let stored = directory.find_by_id(principal.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    fn test_principal() -> Principal {
        let now = Utc::now();
        Principal {
            id: Uuid::new_v4(),
            email: "p@example.com".into(),
            name: "P".into(),
            password_hash: None,
            provider: None,
            provider_subject: None,
            role_id: None,
            active: true,
            verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
