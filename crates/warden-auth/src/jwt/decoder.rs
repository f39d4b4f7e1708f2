//! Token verification.
//!
//! The JWT library checks signature, algorithm, issuer and structure.
//! Expiry is compared here against an explicit instant so callers and
//! tests can evaluate a token at any point in time.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;

use warden_core::config::AuthConfig;

use super::claims::{AccessClaims, RawClaims, RefreshClaims, TokenType};
use crate::error::AuthError;

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    /// Bad signature, wrong issuer, corrupt structure or missing fields.
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unexpected token type")]
    WrongKind,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed(reason) => AuthError::InvalidToken(reason),
            TokenError::WrongKind => AuthError::InvalidToken("unexpected token type".into()),
        }
    }
}

/// Verifies tokens produced by [`super::TokenEncoder`].
#[derive(Clone)]
pub struct TokenDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
    leeway: i64,
}

impl std::fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDecoder")
            .field("validation", &self.validation)
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl TokenDecoder {
    /// HS256 with the configured issuer. Expiry is checked here with
    /// `leeway_seconds`, not by `jsonwebtoken`.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            leeway: config.leeway_seconds as i64,
        }
    }

    /// Verify an access token against the current time.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify_access_at(token, Utc::now())
    }

    pub fn verify_access_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenError> {
        let raw = self.decode_kind(token, TokenType::Access)?;
        self.check_expiry(raw.exp, now)?;

        Ok(AccessClaims {
            sub: raw.sub.ok_or_else(|| missing("sub"))?,
            email: raw.email.ok_or_else(|| missing("email"))?,
            role: raw.role,
            iat: raw.iat.unwrap_or_default(),
            exp: raw.exp,
            iss: raw.iss.unwrap_or_default(),
            token_type: TokenType::Access,
        })
    }

    /// Verify a refresh token. Revocation state is not consulted.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify_refresh_at(token, Utc::now())
    }

    pub fn verify_refresh_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        let raw = self.decode_kind(token, TokenType::Refresh)?;
        self.check_expiry(raw.exp, now)?;
        into_refresh(raw)
    }

    /// Decode a refresh token without the expiry check.
    ///
    /// Logout must be able to name a token that has already expired.
    pub fn decode_refresh_for_logout(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let raw = self.decode_kind(token, TokenType::Refresh)?;
        into_refresh(raw)
    }

    fn decode_kind(&self, token: &str, expected: TokenType) -> Result<RawClaims, TokenError> {
        let data = decode::<RawClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        if data.claims.token_type != Some(expected) {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }

    fn check_expiry(&self, exp: i64, now: DateTime<Utc>) -> Result<(), TokenError> {
        if now.timestamp() >= exp + self.leeway {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

fn into_refresh(raw: RawClaims) -> Result<RefreshClaims, TokenError> {
    let jti = raw
        .jti
        .filter(|jti| !jti.is_empty())
        .ok_or_else(|| missing("jti"))?;
    Ok(RefreshClaims {
        sub: raw.sub.ok_or_else(|| missing("sub"))?,
        jti,
        iat: raw.iat.unwrap_or_default(),
        exp: raw.exp,
        iss: raw.iss.unwrap_or_default(),
        token_type: TokenType::Refresh,
    })
}

fn missing(field: &str) -> TokenError {
    TokenError::Malformed(format!("missing claim '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenEncoder;
    use chrono::Duration;
    use uuid::Uuid;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-for-codec".into(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_access_round_trip_within_ttl() {
        let cfg = config();
        let encoder = TokenEncoder::new(&cfg);
        let decoder = TokenDecoder::new(&cfg);
        let id = Uuid::new_v4();

        let issued = encoder
            .issue_access(id, "alice@example.com", Some("user"))
            .unwrap();
        let claims = decoder.verify_access(&issued.token).unwrap();

        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role.as_deref(), Some("user"));
        assert_eq!(claims.iss, "warden");
    }

    #[test]
    fn test_access_expires_after_ttl() {
        let cfg = config();
        let encoder = TokenEncoder::new(&cfg);
        let decoder = TokenDecoder::new(&cfg);
        let now = Utc::now();

        let issued = encoder
            .issue_access_at(Uuid::new_v4(), "a@example.com", None, now)
            .unwrap();

        assert!(
            decoder
                .verify_access_at(&issued.token, now + Duration::minutes(14))
                .is_ok()
        );
        assert_eq!(
            decoder.verify_access_at(&issued.token, now + Duration::minutes(15)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_leeway_extends_acceptance() {
        let cfg = AuthConfig {
            leeway_seconds: 30,
            ..config()
        };
        let encoder = TokenEncoder::new(&cfg);
        let decoder = TokenDecoder::new(&cfg);
        let now = Utc::now();
        let issued = encoder
            .issue_access_at(Uuid::new_v4(), "a@example.com", None, now)
            .unwrap();

        let just_after = now + Duration::minutes(15) + Duration::seconds(10);
        assert!(decoder.verify_access_at(&issued.token, just_after).is_ok());
    }

    #[test]
    fn test_wrong_key_is_malformed() {
        let encoder = TokenEncoder::new(&config());
        let other = TokenDecoder::new(&AuthConfig {
            jwt_secret: "another-secret".into(),
            ..AuthConfig::default()
        });
        let issued = encoder
            .issue_access(Uuid::new_v4(), "a@example.com", None)
            .unwrap();

        assert!(matches!(
            other.verify_access(&issued.token),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            other.verify_access("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrong_issuer_is_malformed() {
        let encoder = TokenEncoder::new(&AuthConfig {
            issuer: "someone-else".into(),
            ..config()
        });
        let decoder = TokenDecoder::new(&config());
        let issued = encoder
            .issue_access(Uuid::new_v4(), "a@example.com", None)
            .unwrap();

        assert!(matches!(
            decoder.verify_access(&issued.token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let cfg = config();
        let encoder = TokenEncoder::new(&cfg);
        let decoder = TokenDecoder::new(&cfg);
        let id = Uuid::new_v4();

        let refresh = encoder.issue_refresh(id, "tid-1").unwrap();
        let access = encoder.issue_access(id, "a@example.com", None).unwrap();

        assert_eq!(
            decoder.verify_access(&refresh.token),
            Err(TokenError::WrongKind)
        );
        assert_eq!(
            decoder.verify_refresh(&access.token),
            Err(TokenError::WrongKind)
        );
    }

    #[test]
    fn test_refresh_requires_token_id() {
        let cfg = config();
        let encoder = TokenEncoder::new(&cfg);
        let decoder = TokenDecoder::new(&cfg);

        let issued = encoder.issue_refresh(Uuid::new_v4(), "").unwrap();
        assert!(matches!(
            decoder.verify_refresh(&issued.token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_logout_decode_ignores_expiry() {
        let cfg = config();
        let encoder = TokenEncoder::new(&cfg);
        let decoder = TokenDecoder::new(&cfg);
        let long_ago = Utc::now() - Duration::days(30);

        let issued = encoder
            .issue_refresh_at(Uuid::new_v4(), "tid-old", long_ago)
            .unwrap();

        assert_eq!(
            decoder.verify_refresh(&issued.token),
            Err(TokenError::Expired)
        );
        let claims = decoder.decode_refresh_for_logout(&issued.token).unwrap();
        assert_eq!(claims.jti, "tid-old");
    }
}
