//! Token signing and session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Access/refresh token and session orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for token signing (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Issuer claim embedded in and required of every token.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_hours: u64,
    /// Clock skew tolerated when checking token expiry, in seconds.
    #[serde(default)]
    pub leeway_seconds: u64,
    /// Role assigned to newly registered or provisioned principals.
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Upper bound for a single directory round-trip, in milliseconds.
    #[serde(default = "default_directory_timeout")]
    pub directory_timeout_ms: u64,
    /// Maximum number of principals held in the read-through cache.
    #[serde(default = "default_cache_capacity")]
    pub principal_cache_capacity: u64,
    /// Lifetime of a principal cache entry, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub principal_cache_ttl_seconds: u64,
}

impl AuthConfig {
    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_minutes * 60)
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_hours * 3600)
    }

    /// Directory round-trip bound.
    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }

    /// Reject configurations that would produce unusable tokens.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(AppError::configuration("auth.jwt_secret must not be empty"));
        }
        if self.access_ttl_minutes == 0 || self.refresh_ttl_hours == 0 {
            return Err(AppError::configuration(
                "auth.access_ttl_minutes and auth.refresh_ttl_hours must be positive",
            ));
        }
        if self.default_role.trim().is_empty() {
            return Err(AppError::configuration("auth.default_role must not be empty"));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_hours: default_refresh_ttl(),
            leeway_seconds: 0,
            default_role: default_role(),
            directory_timeout_ms: default_directory_timeout(),
            principal_cache_capacity: default_cache_capacity(),
            principal_cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_issuer() -> String {
    "warden".to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    24 * 7
}

fn default_role() -> String {
    "user".to_string()
}

fn default_directory_timeout() -> u64 {
    5_000
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_cache_ttl() -> u64 {
    3_600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = AuthConfig {
            jwt_secret: "  ".to_string(),
            ..AuthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_conversions() {
        let config = AuthConfig::default();
        assert_eq!(config.access_ttl(), Duration::from_secs(900));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(7 * 24 * 3600));
    }
}
