//! Role entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named bundle of permissions.
///
/// The permission set lives in the `role_permissions` join table and is
/// loaded separately.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    /// Unique machine name (e.g. `"admin"`).
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// An inactive role grants nothing.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub active: bool,
}
