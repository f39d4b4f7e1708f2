//! Effective permission resolution.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use warden_database::RoleRepository;
use warden_entity::permission::{MANAGE_ACTION, scope};
use warden_entity::{Principal, Role};

use crate::bounded::directory_call;
use crate::error::AuthResult;

/// A principal's role and the flattened `resource:action` set it grants.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAccess {
    pub role: Option<Role>,
    pub permissions: BTreeSet<String>,
}

impl ResolvedAccess {
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.name.as_str())
    }

    pub fn permits(&self, resource: &str, action: &str) -> bool {
        permits(&self.permissions, resource, action)
    }
}

/// Whether `resource:action` or `resource:manage` is in the set.
pub fn permits(permissions: &BTreeSet<String>, resource: &str, action: &str) -> bool {
    permissions.contains(&scope(resource, action))
        || permissions.contains(&scope(resource, MANAGE_ACTION))
}

/// Resolves principals to their effective permissions.
#[derive(Debug, Clone)]
pub struct RbacResolver {
    roles: Arc<dyn RoleRepository>,
    directory_timeout: Duration,
}

impl RbacResolver {
    pub fn new(roles: Arc<dyn RoleRepository>, directory_timeout: Duration) -> Self {
        Self {
            roles,
            directory_timeout,
        }
    }

    /// Load the principal's role and flatten its active permissions.
    ///
    /// No role, a dangling role reference, or an inactive role all
    /// resolve to an empty permission set.
    pub async fn resolve(&self, principal: &Principal) -> AuthResult<ResolvedAccess> {
        let Some(role_id) = principal.role_id else {
            return Ok(ResolvedAccess::default());
        };

        let role = directory_call(
            self.directory_timeout,
            "find_role",
            self.roles.find_by_id(role_id),
        )
        .await?;
        let Some(role) = role else {
            debug!(principal_id = %principal.id, role_id = %role_id, "Role reference is dangling");
            return Ok(ResolvedAccess::default());
        };

        if !role.active {
            return Ok(ResolvedAccess {
                role: Some(role),
                permissions: BTreeSet::new(),
            });
        }

        let permissions = directory_call(
            self.directory_timeout,
            "role_permissions",
            self.roles.permissions_of(role.id),
        )
        .await?
        .into_iter()
        .filter(|p| p.active)
        .map(|p| p.scope())
        .collect();

        Ok(ResolvedAccess {
            role: Some(role),
            permissions,
        })
    }

    pub async fn effective_permissions(&self, principal: &Principal) -> AuthResult<BTreeSet<String>> {
        Ok(self.resolve(principal).await?.permissions)
    }

    pub async fn authorize(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
    ) -> AuthResult<bool> {
        Ok(self.resolve(principal).await?.permits(resource, action))
    }
}
