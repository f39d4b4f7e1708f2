//! Values returned by the session orchestrator.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_entity::Principal;

/// Request metadata recorded with login events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: Some(user_agent.into()),
        }
    }
}

/// Principal as exposed to API callers, with its resolved access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSnapshot {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub permissions: Vec<String>,
    pub active: bool,
    pub verified: bool,
    pub provider: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl PrincipalSnapshot {
    pub(crate) fn new(
        principal: &Principal,
        role: Option<String>,
        permissions: BTreeSet<String>,
    ) -> Self {
        Self {
            id: principal.id,
            email: principal.email.clone(),
            name: principal.name.clone(),
            role,
            permissions: permissions.into_iter().collect(),
            active: principal.active,
            verified: principal.verified,
            provider: principal.provider.clone(),
            last_login_at: principal.last_login_at,
        }
    }
}

/// A freshly issued token pair.
///
/// Access and refresh expirations are reported separately so transport
/// layers can mirror each TTL (e.g. in cookie lifetimes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub principal: PrincipalSnapshot,
}

/// Start of an OAuth authorization-code flow.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthStart {
    pub state: String,
    pub authorization_url: String,
}

/// Outcome of an OAuth callback.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthCompletion {
    pub tokens: TokenResponse,
    /// Redirect target stored when the flow began.
    pub redirect_to: Option<String>,
}
