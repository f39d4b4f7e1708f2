//! Default permission and role catalog.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use warden_entity::NewPermission;

use super::admin::{RoleAdmin, RoleDraft};
use crate::error::{AuthError, AuthResult};

/// `(resource, action, display name, description)`.
const PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    ("users", "list", "List Users", "View list of users"),
    ("users", "read", "Read User", "View user details"),
    ("users", "create", "Create User", "Create new users"),
    ("users", "update", "Update User", "Update user information"),
    ("users", "delete", "Delete User", "Delete users"),
    ("users", "manage", "Manage Users", "Full user management access"),
    ("roles", "list", "List Roles", "View list of roles"),
    ("roles", "read", "Read Role", "View role details"),
    ("roles", "create", "Create Role", "Create new roles"),
    ("roles", "update", "Update Role", "Update role information"),
    ("roles", "delete", "Delete Role", "Delete roles"),
    ("roles", "manage", "Manage Roles", "Full role management access"),
    ("permissions", "list", "List Permissions", "View list of permissions"),
    ("permissions", "read", "Read Permission", "View permission details"),
    ("permissions", "create", "Create Permission", "Create new permissions"),
    ("permissions", "update", "Update Permission", "Update permission information"),
    ("permissions", "delete", "Delete Permission", "Delete permissions"),
    ("permissions", "manage", "Manage Permissions", "Full permission management access"),
    ("dashboard", "read", "View Dashboard", "Access dashboard"),
    ("dashboard", "stats", "View Statistics", "View dashboard statistics"),
];

struct DefaultRole {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    permissions: &'static [&'static str],
}

const ROLES: &[DefaultRole] = &[
    DefaultRole {
        name: "admin",
        display_name: "Administrator",
        description: "Full system access",
        permissions: &[
            "users:manage",
            "roles:manage",
            "permissions:manage",
            "dashboard:read",
            "dashboard:stats",
        ],
    },
    DefaultRole {
        name: "user",
        display_name: "Regular User",
        description: "Basic user access",
        permissions: &["dashboard:read"],
    },
    DefaultRole {
        name: "moderator",
        display_name: "Moderator",
        description: "User management access",
        permissions: &[
            "users:list",
            "users:read",
            "users:update",
            "dashboard:read",
            "dashboard:stats",
        ],
    },
];

/// What a bootstrap run created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Names of permissions inserted by this run.
    pub permissions_created: Vec<String>,
    /// Names of roles inserted by this run.
    pub roles_created: Vec<String>,
}

impl BootstrapReport {
    /// Whether the catalog was already complete.
    pub fn is_noop(&self) -> bool {
        self.permissions_created.is_empty() && self.roles_created.is_empty()
    }
}

/// Seed the default permissions and roles.
///
/// Existing entries are left untouched, including the grants of a role
/// that already exists, so re-running is harmless. Concurrent runs
/// converge: a row inserted by another run counts as existing.
pub async fn bootstrap_defaults(admin: &RoleAdmin) -> AuthResult<BootstrapReport> {
    let mut report = BootstrapReport::default();
    let mut ids: HashMap<String, Uuid> = HashMap::new();

    for (resource, action, display_name, description) in PERMISSIONS {
        let new = NewPermission::scoped(resource, action, *display_name, *description);
        let permission = match admin.get_permission_by_name(&new.name).await {
            Ok(existing) => existing,
            Err(AuthError::PermissionNotFound) => {
                let name = new.name.clone();
                match admin.create_permission(new).await {
                    Ok(created) => {
                        report.permissions_created.push(created.name.clone());
                        created
                    }
                    // Another bootstrap created it between our lookup and insert.
                    Err(AuthError::PermissionAlreadyExists) => {
                        admin.get_permission_by_name(&name).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };
        ids.insert(permission.name, permission.id);
    }

    for role in ROLES {
        match admin.get_role_by_name(role.name).await {
            Ok(_) => continue,
            Err(AuthError::RoleNotFound) => {}
            Err(e) => return Err(e),
        }

        let permission_ids = role
            .permissions
            .iter()
            .filter_map(|name| ids.get(*name).copied())
            .collect();
        let created = admin
            .create_role(RoleDraft {
                name: role.name.to_string(),
                display_name: role.display_name.to_string(),
                description: role.description.to_string(),
                permission_ids,
            })
            .await;
        match created {
            Ok(_) => report.roles_created.push(role.name.to_string()),
            Err(AuthError::RoleAlreadyExists) => {
                debug!(role = role.name, "Default role created concurrently");
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        permissions = report.permissions_created.len(),
        roles = report.roles_created.len(),
        "Default catalog bootstrapped"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_database::{Directory, MemoryDirectory};

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let admin = RoleAdmin::new(
            Directory::memory(MemoryDirectory::new()),
            Duration::from_secs(5),
        );

        let first = bootstrap_defaults(&admin).await.unwrap();
        assert_eq!(first.permissions_created.len(), 20);
        assert_eq!(first.roles_created, vec!["admin", "user", "moderator"]);

        let second = bootstrap_defaults(&admin).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(admin.list_permissions(None).await.unwrap().len(), 20);
        assert_eq!(admin.list_roles().await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bootstrap_converges() {
        for _ in 0..50 {
            let admin = RoleAdmin::new(
                Directory::memory(MemoryDirectory::new()),
                Duration::from_secs(5),
            );
            let runs: Vec<_> = (0..2)
                .map(|_| {
                    let admin = admin.clone();
                    tokio::spawn(async move { bootstrap_defaults(&admin).await })
                })
                .collect();

            let mut permissions_created = 0;
            let mut roles_created = 0;
            for run in runs {
                let report = run.await.unwrap().unwrap();
                permissions_created += report.permissions_created.len();
                roles_created += report.roles_created.len();
            }

            assert_eq!(permissions_created, 20);
            assert_eq!(roles_created, 3);
            assert_eq!(admin.list_permissions(None).await.unwrap().len(), 20);
            assert_eq!(admin.list_roles().await.unwrap().len(), 3);
            assert_eq!(admin.get_role_by_name("admin").await.unwrap().permissions.len(), 5);
        }
    }

    #[tokio::test]
    async fn test_default_grants() {
        let admin = RoleAdmin::new(
            Directory::memory(MemoryDirectory::new()),
            Duration::from_secs(5),
        );
        bootstrap_defaults(&admin).await.unwrap();

        let mut user: Vec<_> = admin
            .get_role_by_name("user")
            .await
            .unwrap()
            .permissions
            .into_iter()
            .map(|p| p.name)
            .collect();
        user.sort();
        assert_eq!(user, vec!["dashboard:read"]);

        let moderator = admin.get_role_by_name("moderator").await.unwrap();
        assert_eq!(moderator.permissions.len(), 5);
        assert_eq!(moderator.role.display_name, "Moderator");
    }
}
