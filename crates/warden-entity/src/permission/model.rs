//! Permission entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Action that implies every other action on the same resource.
pub const MANAGE_ACTION: &str = "manage";

/// A single `resource:action` grant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: Uuid,
    /// Unique name, conventionally `resource:action`.
    pub name: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    pub description: String,
    /// Inactive permissions are skipped during resolution.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// The `resource:action` string used in effective permission sets.
    pub fn scope(&self) -> String {
        scope(&self.resource, &self.action)
    }

    /// Whether this permission is the `manage` wildcard for its resource.
    pub fn is_wildcard(&self) -> bool {
        self.action == MANAGE_ACTION
    }
}

/// Data required to create a permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    pub description: String,
    pub active: bool,
}

impl NewPermission {
    /// Build an active permission named after its scope.
    pub fn scoped(
        resource: &str,
        action: &str,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: scope(resource, action),
            resource: resource.to_string(),
            action: action.to_string(),
            display_name: display_name.into(),
            description: description.into(),
            active: true,
        }
    }
}

/// Join a resource and an action into a scope string.
pub fn scope(resource: &str, action: &str) -> String {
    format!("{resource}:{action}")
}
