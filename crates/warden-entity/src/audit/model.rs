//! Login event entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One recorded login outcome for a known principal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginEvent {
    pub id: Uuid,
    pub principal_id: Uuid,
    /// Client IP address as reported by the API layer.
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// `"password"` or the identity provider name.
    pub method: String,
    pub success: bool,
    /// Short machine-readable reason for a failed attempt.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data required to record a login event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoginEvent {
    pub principal_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub success: bool,
    pub failure_reason: Option<String>,
}
