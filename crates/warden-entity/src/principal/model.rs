//! Principal entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An authenticated identity known to the directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Principal {
    /// Unique principal identifier.
    pub id: Uuid,
    /// Email address, stored lower-cased. Unique.
    pub email: String,
    /// Human-readable display name.
    pub name: String,
    /// Argon2 password hash. `None` for externally authenticated principals.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Identity provider name (e.g. `"google"`), if linked.
    pub provider: Option<String>,
    /// Subject identifier issued by the provider.
    pub provider_subject: Option<String>,
    /// Assigned role. The sole source of authorization.
    pub role_id: Option<Uuid>,
    /// Inactive principals can neither log in nor refresh.
    pub active: bool,
    /// Whether the email address has been verified.
    pub verified: bool,
    /// Consecutive failed password logins.
    #[serde(skip_serializing)]
    pub failed_login_attempts: i32,
    /// Login is rejected until this instant.
    pub locked_until: Option<DateTime<Utc>>,
    /// Last successful login time.
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Check if a lock is in force at `now`.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Whether the principal can authenticate with a password at all.
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Whether the principal is linked to the given provider subject.
    pub fn is_linked_to(&self, provider: &str, subject: &str) -> bool {
        self.provider.as_deref() == Some(provider)
            && self.provider_subject.as_deref() == Some(subject)
    }
}

/// Data required to create a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrincipal {
    pub email: String,
    pub name: String,
    /// Pre-hashed password, absent for provider-provisioned principals.
    pub password_hash: Option<String>,
    pub provider: Option<String>,
    pub provider_subject: Option<String>,
    pub role_id: Option<Uuid>,
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn principal() -> Principal {
        let now = Utc::now();
        Principal {
            id: Uuid::new_v4(),
            email: "bob@example.com".to_string(),
            name: "Bob".to_string(),
            password_hash: None,
            provider: Some("google".to_string()),
            provider_subject: Some("1234".to_string()),
            role_id: None,
            active: true,
            verified: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lock_is_time_bound() {
        let now = Utc::now();
        let mut p = principal();
        assert!(!p.is_locked_at(now));
        p.locked_until = Some(now + Duration::minutes(15));
        assert!(p.is_locked_at(now));
        assert!(!p.is_locked_at(now + Duration::minutes(16)));
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let mut p = principal();
        p.password_hash = Some("$argon2id$secret".to_string());
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(p.has_password());
        assert!(p.is_linked_to("google", "1234"));
    }
}
