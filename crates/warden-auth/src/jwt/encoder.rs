//! Token issuance.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use warden_core::config::AuthConfig;

use super::claims::{AccessClaims, RefreshClaims, TokenType};
use crate::error::{AuthError, AuthResult};

/// A signed token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs access and refresh tokens with HS256.
#[derive(Clone)]
pub struct TokenEncoder {
    encoding_key: EncodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEncoder")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenEncoder {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: Duration::minutes(config.access_ttl_minutes as i64),
            refresh_ttl: Duration::hours(config.refresh_ttl_hours as i64),
        }
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(
        &self,
        principal_id: Uuid,
        email: &str,
        role: Option<&str>,
    ) -> AuthResult<IssuedToken> {
        self.issue_access_at(principal_id, email, role, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        principal_id: Uuid,
        email: &str,
        role: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: principal_id,
            email: email.to_string(),
            role: role.map(str::to_string),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            token_type: TokenType::Access,
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn issue_refresh(&self, principal_id: Uuid, token_id: &str) -> AuthResult<IssuedToken> {
        self.issue_refresh_at(principal_id, token_id, Utc::now())
    }

    pub fn issue_refresh_at(
        &self,
        principal_id: Uuid,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        let expires_at = now + self.refresh_ttl;
        let claims = RefreshClaims {
            sub: principal_id,
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            token_type: TokenType::Refresh,
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, expires_at })
    }

    fn sign<T: serde::Serialize>(&self, claims: &T) -> AuthResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }
}
