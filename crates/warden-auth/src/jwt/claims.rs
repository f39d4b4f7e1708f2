//! Claim payloads carried by Warden tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer credential for API requests.
    Access,
    /// Single-use credential exchanged for a new token pair.
    Refresh,
}

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Principal id.
    pub sub: Uuid,
    pub email: String,
    /// Role name at issuance. Display only, never used for authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_type: TokenType,
}

/// Claims embedded in every refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Principal id.
    pub sub: Uuid,
    /// Token id naming the revocation record.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_type: TokenType,
}

impl AccessClaims {
    /// Expiration as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }
}

impl RefreshClaims {
    /// Expiration as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }

    /// Lifetime left at `now`, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        let secs = self.exp - now.timestamp();
        if secs > 0 {
            std::time::Duration::from_secs(secs as u64)
        } else {
            std::time::Duration::ZERO
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Wire shape accepted by the decoder before kind and field checks.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClaims {
    pub sub: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    pub exp: i64,
    #[serde(default)]
    pub iss: Option<String>,
    pub token_type: Option<TokenType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_remaining_lifetime_saturates() {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: Uuid::new_v4(),
            jti: "abc".into(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(90)).timestamp(),
            iss: "warden".into(),
            token_type: TokenType::Refresh,
        };
        assert_eq!(claims.remaining_at(now).as_secs(), 90);
        assert!(claims.remaining_at(now + Duration::hours(1)).is_zero());
    }

    #[test]
    fn test_token_type_wire_format() {
        let json = serde_json::to_string(&TokenType::Refresh).unwrap_or_default();
        assert_eq!(json, "\"refresh\"");
    }
}
