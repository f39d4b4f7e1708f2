//! Role and permission administration.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use warden_core::result::AppResult;
use warden_database::Directory;
use warden_entity::permission::scope;
use warden_entity::{NewPermission, NewRole, Permission, Role};

use crate::bounded::directory_call;
use crate::error::{AuthError, AuthResult};

/// A role together with the permissions granted to it.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDetails {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

/// Input for creating a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleDraft {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Partial role update. `None` leaves a field untouched; a present
/// permission list replaces the role's whole set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub permission_ids: Option<Vec<Uuid>>,
}

/// Partial permission update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionUpdate {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub active: Option<bool>,
}

/// CRUD over roles, permissions and their grants.
#[derive(Debug, Clone)]
pub struct RoleAdmin {
    directory: Directory,
    directory_timeout: Duration,
}

impl RoleAdmin {
    pub fn new(directory: Directory, directory_timeout: Duration) -> Self {
        Self {
            directory,
            directory_timeout,
        }
    }

    // ── Roles ──────────────────────────────────────────────

    pub async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        Ok(self.call("list_roles", self.directory.roles.list()).await?)
    }

    pub async fn get_role(&self, id: Uuid) -> AuthResult<RoleDetails> {
        let role = self.require_role(id).await?;
        self.details(role).await
    }

    pub async fn get_role_by_name(&self, name: &str) -> AuthResult<RoleDetails> {
        let role = self
            .call("find_role_by_name", self.directory.roles.find_by_name(name))
            .await?
            .ok_or(AuthError::RoleNotFound)?;
        self.details(role).await
    }

    pub async fn create_role(&self, draft: RoleDraft) -> AuthResult<RoleDetails> {
        let existing = self
            .call(
                "find_role_by_name",
                self.directory.roles.find_by_name(&draft.name),
            )
            .await?;
        if existing.is_some() {
            return Err(AuthError::RoleAlreadyExists);
        }
        self.ensure_permissions_exist(&draft.permission_ids).await?;

        let new = NewRole {
            name: draft.name,
            display_name: draft.display_name,
            description: draft.description,
            active: true,
        };
        let role = self
            .call("create_role", self.directory.roles.create(&new))
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::RoleAlreadyExists
                } else {
                    AuthError::from(e)
                }
            })?;

        if !draft.permission_ids.is_empty() {
            self.call(
                "add_role_permissions",
                self.directory
                    .roles
                    .add_permissions(role.id, &draft.permission_ids),
            )
            .await?;
        }

        info!(role_id = %role.id, role = %role.name, "Role created");
        self.details(role).await
    }

    pub async fn update_role(&self, id: Uuid, update: RoleUpdate) -> AuthResult<RoleDetails> {
        let mut role = self.require_role(id).await?;
        if let Some(ids) = &update.permission_ids {
            self.ensure_permissions_exist(ids).await?;
        }

        if let Some(display_name) = update.display_name {
            role.display_name = display_name;
        }
        if let Some(description) = update.description {
            role.description = description;
        }
        if let Some(active) = update.active {
            role.active = active;
        }
        let role = self
            .call("update_role", self.directory.roles.update(&role))
            .await?;

        if let Some(ids) = &update.permission_ids {
            self.call(
                "replace_role_permissions",
                self.directory.roles.replace_permissions(role.id, ids),
            )
            .await?;
        }

        info!(role_id = %role.id, "Role updated");
        self.details(role).await
    }

    /// Delete a role. Fails with [`AuthError::RoleInUse`] while any
    /// principal still references it.
    pub async fn delete_role(&self, id: Uuid) -> AuthResult<()> {
        let role = self.require_role(id).await?;

        let assigned = self
            .call(
                "count_by_role",
                self.directory.principals.count_by_role(role.id),
            )
            .await?;
        if assigned > 0 {
            return Err(AuthError::RoleInUse);
        }

        let deleted = self
            .call("delete_role", self.directory.roles.delete(role.id))
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::RoleInUse
                } else {
                    AuthError::from(e)
                }
            })?;
        if !deleted {
            return Err(AuthError::RoleNotFound);
        }

        info!(role_id = %role.id, role = %role.name, "Role deleted");
        Ok(())
    }

    /// Grant additional permissions; existing grants are kept.
    pub async fn assign_permissions(&self, role_id: Uuid, ids: &[Uuid]) -> AuthResult<()> {
        self.require_role(role_id).await?;
        self.ensure_permissions_exist(ids).await?;
        self.call(
            "add_role_permissions",
            self.directory.roles.add_permissions(role_id, ids),
        )
        .await?;
        info!(role_id = %role_id, count = ids.len(), "Permissions granted");
        Ok(())
    }

    /// Replace the role's permission set.
    pub async fn replace_permissions(&self, role_id: Uuid, ids: &[Uuid]) -> AuthResult<()> {
        self.require_role(role_id).await?;
        self.ensure_permissions_exist(ids).await?;
        self.call(
            "replace_role_permissions",
            self.directory.roles.replace_permissions(role_id, ids),
        )
        .await?;
        info!(role_id = %role_id, count = ids.len(), "Permission set replaced");
        Ok(())
    }

    pub async fn remove_permissions(&self, role_id: Uuid, ids: &[Uuid]) -> AuthResult<()> {
        self.require_role(role_id).await?;
        self.call(
            "remove_role_permissions",
            self.directory.roles.remove_permissions(role_id, ids),
        )
        .await?;
        info!(role_id = %role_id, count = ids.len(), "Permissions revoked");
        Ok(())
    }

    // ── Permissions ────────────────────────────────────────

    /// List permissions, optionally restricted to one resource.
    pub async fn list_permissions(&self, resource: Option<&str>) -> AuthResult<Vec<Permission>> {
        let all = self
            .call("list_permissions", self.directory.permissions.list())
            .await?;
        Ok(match resource {
            Some(resource) => all.into_iter().filter(|p| p.resource == resource).collect(),
            None => all,
        })
    }

    pub async fn get_permission(&self, id: Uuid) -> AuthResult<Permission> {
        self.call("find_permission", self.directory.permissions.find_by_id(id))
            .await?
            .ok_or(AuthError::PermissionNotFound)
    }

    pub async fn get_permission_by_name(&self, name: &str) -> AuthResult<Permission> {
        self.call(
            "find_permission_by_name",
            self.directory.permissions.find_by_name(name),
        )
        .await?
        .ok_or(AuthError::PermissionNotFound)
    }

    pub async fn create_permission(&self, new: NewPermission) -> AuthResult<Permission> {
        let existing = self
            .call(
                "find_permission_by_name",
                self.directory.permissions.find_by_name(&new.name),
            )
            .await?;
        if existing.is_some() {
            return Err(AuthError::PermissionAlreadyExists);
        }

        let permission = self
            .call("create_permission", self.directory.permissions.create(&new))
            .await
            .map_err(permission_write_error)?;
        info!(permission = %permission.name, "Permission created");
        Ok(permission)
    }

    /// Apply a partial update. Changing resource or action renames the
    /// permission to the new `resource:action`.
    pub async fn update_permission(
        &self,
        id: Uuid,
        update: PermissionUpdate,
    ) -> AuthResult<Permission> {
        let mut permission = self.get_permission(id).await?;

        if let Some(display_name) = update.display_name {
            permission.display_name = display_name;
        }
        if let Some(description) = update.description {
            permission.description = description;
        }
        if let Some(active) = update.active {
            permission.active = active;
        }
        let rescoped = update.resource.is_some() || update.action.is_some();
        if let Some(resource) = update.resource {
            permission.resource = resource;
        }
        if let Some(action) = update.action {
            permission.action = action;
        }
        if rescoped {
            permission.name = scope(&permission.resource, &permission.action);
        }

        let permission = self
            .call(
                "update_permission",
                self.directory.permissions.update(&permission),
            )
            .await
            .map_err(permission_write_error)?;
        info!(permission = %permission.name, "Permission updated");
        Ok(permission)
    }

    /// Delete a permission; grants referencing it go with it.
    pub async fn delete_permission(&self, id: Uuid) -> AuthResult<()> {
        let deleted = self
            .call("delete_permission", self.directory.permissions.delete(id))
            .await?;
        if !deleted {
            return Err(AuthError::PermissionNotFound);
        }
        info!(permission_id = %id, "Permission deleted");
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────

    async fn require_role(&self, id: Uuid) -> AuthResult<Role> {
        self.call("find_role", self.directory.roles.find_by_id(id))
            .await?
            .ok_or(AuthError::RoleNotFound)
    }

    async fn details(&self, role: Role) -> AuthResult<RoleDetails> {
        let permissions = self
            .call(
                "role_permissions",
                self.directory.roles.permissions_of(role.id),
            )
            .await?;
        Ok(RoleDetails { role, permissions })
    }

    /// Every id must name an existing permission; the first missing one
    /// is reported.
    async fn ensure_permissions_exist(&self, ids: &[Uuid]) -> AuthResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let found: BTreeSet<Uuid> = self
            .call(
                "find_permissions",
                self.directory.permissions.find_by_ids(ids),
            )
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        match ids.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(AuthError::InvalidPermissionReference(*missing)),
            None => Ok(()),
        }
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        directory_call(self.directory_timeout, operation, fut).await
    }
}

fn permission_write_error(err: warden_core::AppError) -> AuthError {
    if err.is_conflict() {
        AuthError::PermissionAlreadyExists
    } else {
        AuthError::from(err)
    }
}
