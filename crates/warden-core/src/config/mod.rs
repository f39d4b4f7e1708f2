//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files and `WARDEN__`-prefixed environment variables. Each
//! sub-module represents a logical configuration section, and every field
//! carries a serde default so an absent file still yields a usable
//! configuration.

pub mod auth;
pub mod cache;
pub mod database;
pub mod logging;
pub mod oauth;
pub mod security;

use serde::{Deserialize, Serialize};

pub use self::auth::AuthConfig;
pub use self::cache::{MemoryStoreConfig, RedisStoreConfig, StoreConfig};
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::oauth::{GoogleOAuthConfig, OAuthConfig};
pub use self::security::SecurityConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Revocation/session store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Token signing and session settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Rate limiting, lockout, and password policy.
    #[serde(default)]
    pub security: SecurityConfig,
    /// External identity providers.
    #[serde(default)]
    pub oauth: OAuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files and the environment.
    ///
    /// `path` names the base file (extension optional). An overlay named
    /// `config/{env}` is merged on top when present, followed by environment
    /// variables such as `WARDEN__AUTH__JWT_SECRET`.
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.auth.validate()?;
        loaded.security.validate()?;

        tracing::debug!(
            store = %loaded.store.provider,
            issuer = %loaded.auth.issuer,
            "Configuration loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = AppConfig::default();
        assert_eq!(config.auth.access_ttl_minutes, 15);
        assert_eq!(config.auth.refresh_ttl_hours, 168);
        assert_eq!(config.security.max_failed_attempts, 5);
        assert_eq!(config.store.provider, "memory");
        assert_eq!(config.oauth.google.state_ttl_minutes, 15);
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let config = AppConfig::load("does/not/exist", "nowhere").unwrap();
        assert_eq!(config.auth.default_role, "user");
        assert_eq!(config.security.rate_limit_window_seconds, 60);
    }
}
