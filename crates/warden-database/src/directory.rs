//! Repository traits consumed by the authentication engine.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use warden_core::result::AppResult;
use warden_entity::{
    LoginEvent, NewLoginEvent, NewPermission, NewPrincipal, NewRole, Permission, Principal, Role,
};

use crate::connection::DatabasePool;
use crate::memory::MemoryDirectory;
use crate::repositories::{PgPermissionRepository, PgPrincipalRepository, PgRoleRepository};

/// Principal storage.
///
/// `create` fails with a conflict error when the email is already taken.
/// `increment_failed_attempts` must be a single atomic operation returning
/// the new count.
#[async_trait]
pub trait PrincipalRepository: Send + Sync + Debug + 'static {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Principal>>;

    /// Look up by email, case-insensitively.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Principal>>;

    async fn find_by_provider_id(
        &self,
        provider: &str,
        subject: &str,
    ) -> AppResult<Option<Principal>>;

    async fn create(&self, data: &NewPrincipal) -> AppResult<Principal>;

    /// Every principal, oldest first, optionally only holders of `role_id`.
    async fn list(&self, role_id: Option<Uuid>) -> AppResult<Vec<Principal>>;

    /// Set the active flag. Returns `false` when no such principal exists.
    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<bool>;

    /// Point the principal at a role, or at none. Returns `false` when no
    /// such principal exists.
    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> AppResult<bool>;

    /// Attach an external identity and return the updated row.
    ///
    /// `verified` only ever raises the flag. Fails with a conflict error
    /// when the `(provider, subject)` pair already belongs to another
    /// principal.
    async fn link_provider(
        &self,
        id: Uuid,
        provider: &str,
        subject: &str,
        verified: bool,
    ) -> AppResult<Option<Principal>>;

    /// Atomically increment the failed-attempt counter and return the new value.
    async fn increment_failed_attempts(&self, id: Uuid) -> AppResult<i32>;

    /// Zero the counter and clear any lock.
    async fn reset_failed_attempts(&self, id: Uuid) -> AppResult<()>;

    async fn set_lock_until(&self, id: Uuid, until: Option<DateTime<Utc>>) -> AppResult<()>;

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Number of principals assigned to the role.
    async fn count_by_role(&self, role_id: Uuid) -> AppResult<u64>;

    async fn record_login_event(&self, event: &NewLoginEvent) -> AppResult<()>;

    /// Most recent login events, newest first.
    async fn recent_login_events(&self, id: Uuid, limit: u32) -> AppResult<Vec<LoginEvent>>;
}

/// Role storage, including the role-to-permission join.
#[async_trait]
pub trait RoleRepository: Send + Sync + Debug + 'static {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Role>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    async fn list(&self) -> AppResult<Vec<Role>>;

    /// Fails with a conflict error on a duplicate name.
    async fn create(&self, data: &NewRole) -> AppResult<Role>;

    async fn update(&self, role: &Role) -> AppResult<Role>;

    /// Returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Permissions attached to the role, active or not.
    async fn permissions_of(&self, role_id: Uuid) -> AppResult<Vec<Permission>>;

    async fn replace_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AppResult<()>;

    /// Attach permissions; already attached ones are ignored.
    async fn add_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AppResult<()>;

    async fn remove_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AppResult<()>;
}

/// Permission storage.
#[async_trait]
pub trait PermissionRepository: Send + Sync + Debug + 'static {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Permission>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Permission>>;

    /// Fetch the permissions among `ids` that exist.
    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Permission>>;

    async fn list(&self) -> AppResult<Vec<Permission>>;

    /// Fails with a conflict error on a duplicate name.
    async fn create(&self, data: &NewPermission) -> AppResult<Permission>;

    async fn update(&self, permission: &Permission) -> AppResult<Permission>;

    /// Returns whether a row was deleted. Role grants are removed with it.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

/// The three repositories the engine needs, behind shared trait objects.
#[derive(Debug, Clone)]
pub struct Directory {
    pub principals: Arc<dyn PrincipalRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
}

impl Directory {
    /// PostgreSQL-backed directory.
    pub fn postgres(db: &DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            principals: Arc::new(PgPrincipalRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool.clone())),
            permissions: Arc::new(PgPermissionRepository::new(pool)),
        }
    }

    /// Directory sharing one in-memory state across all three repositories.
    pub fn memory(directory: MemoryDirectory) -> Self {
        Self {
            principals: Arc::new(directory.clone()),
            roles: Arc::new(directory.clone()),
            permissions: Arc::new(directory),
        }
    }
}
