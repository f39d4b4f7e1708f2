//! In-memory implementation of every repository trait.
//!
//! All state sits behind one async `RwLock`, so compound operations such as
//! the failed-attempt increment are atomic in the same way the SQL
//! statements are.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_entity::{
    LoginEvent, NewLoginEvent, NewPermission, NewPrincipal, NewRole, Permission, Principal, Role,
};

use crate::directory::{PermissionRepository, PrincipalRepository, RoleRepository};

#[derive(Debug, Default)]
struct State {
    principals: HashMap<Uuid, Principal>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    grants: HashMap<Uuid, BTreeSet<Uuid>>,
    login_events: Vec<LoginEvent>,
}

impl State {
    fn principal_mut(&mut self, id: Uuid) -> AppResult<&mut Principal> {
        self.principals
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Principal {id} not found")))
    }

    fn email_taken(&self, email: &str) -> bool {
        self.principals.values().any(|p| p.email == email)
    }
}

/// Shared in-memory directory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<State>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every login event recorded so far, oldest first.
    pub async fn login_events(&self) -> Vec<LoginEvent> {
        self.state.read().await.login_events.clone()
    }
}

#[async_trait]
impl PrincipalRepository for MemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Principal>> {
        Ok(self.state.read().await.principals.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Principal>> {
        let email = email.to_lowercase();
        let state = self.state.read().await;
        Ok(state.principals.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: &str,
        subject: &str,
    ) -> AppResult<Option<Principal>> {
        let state = self.state.read().await;
        Ok(state
            .principals
            .values()
            .find(|p| p.is_linked_to(provider, subject))
            .cloned())
    }

    async fn create(&self, data: &NewPrincipal) -> AppResult<Principal> {
        let email = data.email.to_lowercase();
        let mut state = self.state.write().await;
        if state.email_taken(&email) {
            return Err(AppError::conflict("Email already registered"));
        }
        let now = Utc::now();
        let principal = Principal {
            id: Uuid::now_v7(),
            email,
            name: data.name.clone(),
            password_hash: data.password_hash.clone(),
            provider: data.provider.clone(),
            provider_subject: data.provider_subject.clone(),
            role_id: data.role_id,
            active: true,
            verified: data.verified,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.principals.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn list(&self, role_id: Option<Uuid>) -> AppResult<Vec<Principal>> {
        let state = self.state.read().await;
        let mut principals: Vec<Principal> = state
            .principals
            .values()
            .filter(|p| role_id.is_none() || p.role_id == role_id)
            .cloned()
            .collect();
        principals.sort_by(|a, b| (a.created_at, &a.email).cmp(&(b.created_at, &b.email)));
        Ok(principals)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state.principals.get_mut(&id) else {
            return Ok(false);
        };
        stored.active = active;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state.principals.get_mut(&id) else {
            return Ok(false);
        };
        stored.role_id = role_id;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn link_provider(
        &self,
        id: Uuid,
        provider: &str,
        subject: &str,
        verified: bool,
    ) -> AppResult<Option<Principal>> {
        let mut state = self.state.write().await;
        let linked_elsewhere = state
            .principals
            .values()
            .any(|p| p.id != id && p.is_linked_to(provider, subject));
        if linked_elsewhere {
            return Err(AppError::conflict(
                "Identity already linked to another principal",
            ));
        }
        let Some(stored) = state.principals.get_mut(&id) else {
            return Ok(None);
        };
        stored.provider = Some(provider.to_string());
        stored.provider_subject = Some(subject.to_string());
        stored.verified |= verified;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn increment_failed_attempts(&self, id: Uuid) -> AppResult<i32> {
        let mut state = self.state.write().await;
        let stored = state.principal_mut(id)?;
        stored.failed_login_attempts += 1;
        stored.updated_at = Utc::now();
        Ok(stored.failed_login_attempts)
    }

    async fn reset_failed_attempts(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state.principal_mut(id)?;
        stored.failed_login_attempts = 0;
        stored.locked_until = None;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn set_lock_until(&self, id: Uuid, until: Option<DateTime<Utc>>) -> AppResult<()> {
        let mut state = self.state.write().await;
        let stored = state.principal_mut(id)?;
        stored.locked_until = until;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.principal_mut(id)?.last_login_at = Some(at);
        Ok(())
    }

    async fn count_by_role(&self, role_id: Uuid) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .principals
            .values()
            .filter(|p| p.role_id == Some(role_id))
            .count() as u64)
    }

    async fn record_login_event(&self, event: &NewLoginEvent) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.login_events.push(LoginEvent {
            id: Uuid::now_v7(),
            principal_id: event.principal_id,
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            method: event.method.clone(),
            success: event.success,
            failure_reason: event.failure_reason.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_login_events(&self, id: Uuid, limit: u32) -> AppResult<Vec<LoginEvent>> {
        let state = self.state.read().await;
        Ok(state
            .login_events
            .iter()
            .rev()
            .filter(|e| e.principal_id == id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleRepository for MemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.values().find(|r| r.name == name).cloned())
    }

    async fn list(&self) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create(&self, data: &NewRole) -> AppResult<Role> {
        let mut state = self.state.write().await;
        if state.roles.values().any(|r| r.name == data.name) {
            return Err(AppError::conflict(format!(
                "Role '{}' already exists",
                data.name
            )));
        }
        let now = Utc::now();
        let role = Role {
            id: Uuid::now_v7(),
            name: data.name.clone(),
            display_name: data.display_name.clone(),
            description: data.description.clone(),
            active: data.active,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update(&self, role: &Role) -> AppResult<Role> {
        let mut state = self.state.write().await;
        if state
            .roles
            .values()
            .any(|r| r.name == role.name && r.id != role.id)
        {
            return Err(AppError::conflict(format!(
                "Role '{}' already exists",
                role.name
            )));
        }
        let stored = state
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", role.id)))?;
        stored.name = role.name.clone();
        stored.display_name = role.display_name.clone();
        stored.description = role.description.clone();
        stored.active = role.active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.principals.values().any(|p| p.role_id == Some(id)) {
            return Err(AppError::conflict(format!("Role {id} is still assigned")));
        }
        state.grants.remove(&id);
        Ok(state.roles.remove(&id).is_some())
    }

    async fn permissions_of(&self, role_id: Uuid) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .grants
            .get(&role_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn replace_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AppResult<()> {
        let mut state = self.state.write().await;
        state
            .grants
            .insert(role_id, permission_ids.iter().copied().collect());
        Ok(())
    }

    async fn add_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AppResult<()> {
        let mut state = self.state.write().await;
        state
            .grants
            .entry(role_id)
            .or_default()
            .extend(permission_ids.iter().copied());
        Ok(())
    }

    async fn remove_permissions(&self, role_id: Uuid, permission_ids: &[Uuid]) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(grants) = state.grants.get_mut(&role_id) {
            for id in permission_ids {
                grants.remove(id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for MemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Permission>> {
        Ok(self.state.read().await.permissions.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect())
    }

    async fn list(&self) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        Ok(permissions)
    }

    async fn create(&self, data: &NewPermission) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        if state.permissions.values().any(|p| p.name == data.name) {
            return Err(AppError::conflict(format!(
                "Permission '{}' already exists",
                data.name
            )));
        }
        let now = Utc::now();
        let permission = Permission {
            id: Uuid::now_v7(),
            name: data.name.clone(),
            resource: data.resource.clone(),
            action: data.action.clone(),
            display_name: data.display_name.clone(),
            description: data.description.clone(),
            active: data.active,
            created_at: now,
            updated_at: now,
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update(&self, permission: &Permission) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        if state
            .permissions
            .values()
            .any(|p| p.name == permission.name && p.id != permission.id)
        {
            return Err(AppError::conflict(format!(
                "Permission '{}' already exists",
                permission.name
            )));
        }
        let stored = state.permissions.get_mut(&permission.id).ok_or_else(|| {
            AppError::not_found(format!("Permission {} not found", permission.id))
        })?;
        stored.name = permission.name.clone();
        stored.resource = permission.resource.clone();
        stored.action = permission.action.clone();
        stored.display_name = permission.display_name.clone();
        stored.description = permission.description.clone();
        stored.active = permission.active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        for grants in state.grants.values_mut() {
            grants.remove(&id);
        }
        Ok(state.permissions.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_principal(email: &str) -> NewPrincipal {
        NewPrincipal {
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: Some("hash".to_string()),
            provider: None,
            provider_subject: None,
            role_id: None,
            verified: false,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email_case_insensitively() {
        let dir = MemoryDirectory::new();
        PrincipalRepository::create(&dir, &new_principal("Alice@Example.com"))
            .await
            .unwrap();
        let err = PrincipalRepository::create(&dir, &new_principal("alice@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let found = dir.find_by_email("ALICE@example.com").await.unwrap();
        assert_eq!(found.unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_serialized() {
        let dir = MemoryDirectory::new();
        let p = PrincipalRepository::create(&dir, &new_principal("c@example.com"))
            .await
            .unwrap();

        let id = p.id;
        let mut handles = Vec::new();
        for _ in 0..10 {
            let dir = dir.clone();
            handles.push(tokio::spawn(async move {
                dir.increment_failed_attempts(id).await.unwrap()
            }));
        }
        let mut counts = Vec::new();
        for h in handles {
            counts.push(h.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=10).collect::<Vec<i32>>());
    }

    #[tokio::test]
    async fn test_reset_clears_lock() {
        let dir = MemoryDirectory::new();
        let p = PrincipalRepository::create(&dir, &new_principal("r@example.com"))
            .await
            .unwrap();
        dir.increment_failed_attempts(p.id).await.unwrap();
        dir.set_lock_until(p.id, Some(Utc::now())).await.unwrap();
        dir.reset_failed_attempts(p.id).await.unwrap();

        let p = PrincipalRepository::find_by_id(&dir, p.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.failed_login_attempts, 0);
        assert!(p.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_link_provider_keeps_other_fields() {
        let dir = MemoryDirectory::new();
        let p = PrincipalRepository::create(&dir, &new_principal("l@example.com"))
            .await
            .unwrap();
        let other = PrincipalRepository::create(&dir, &new_principal("m@example.com"))
            .await
            .unwrap();
        assert!(dir.set_active(p.id, false).await.unwrap());

        let linked = dir
            .link_provider(p.id, "google", "sub-1", false)
            .await
            .unwrap()
            .unwrap();
        assert!(linked.is_linked_to("google", "sub-1"));
        assert!(!linked.active);
        assert!(!linked.verified);
        assert_eq!(linked.password_hash.as_deref(), Some("hash"));

        let err = dir
            .link_provider(other.id, "google", "sub-1", true)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(dir.link_provider(Uuid::nil(), "google", "sub-2", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_role() {
        let dir = MemoryDirectory::new();
        let role = RoleRepository::create(
            &dir,
            &NewRole {
                name: "ops".to_string(),
                display_name: "Ops".to_string(),
                description: String::new(),
                active: true,
            },
        )
        .await
        .unwrap();
        let a = PrincipalRepository::create(&dir, &new_principal("a@example.com"))
            .await
            .unwrap();
        PrincipalRepository::create(&dir, &new_principal("b@example.com"))
            .await
            .unwrap();
        assert!(dir.set_role(a.id, Some(role.id)).await.unwrap());
        assert!(!dir.set_role(Uuid::nil(), Some(role.id)).await.unwrap());

        assert_eq!(PrincipalRepository::list(&dir, None).await.unwrap().len(), 2);
        let holders = PrincipalRepository::list(&dir, Some(role.id)).await.unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].email, "a@example.com");
    }

    #[tokio::test]
    async fn test_deleting_permission_drops_grants() {
        let dir = MemoryDirectory::new();
        let perm = PermissionRepository::create(
            &dir,
            &NewPermission::scoped("users", "read", "Read Users", ""),
        )
        .await
        .unwrap();
        let role = RoleRepository::create(
            &dir,
            &NewRole {
                name: "viewer".to_string(),
                display_name: "Viewer".to_string(),
                description: String::new(),
                active: true,
            },
        )
        .await
        .unwrap();
        dir.add_permissions(role.id, &[perm.id]).await.unwrap();
        assert_eq!(dir.permissions_of(role.id).await.unwrap().len(), 1);

        assert!(PermissionRepository::delete(&dir, perm.id).await.unwrap());
        assert!(dir.permissions_of(role.id).await.unwrap().is_empty());
    }
}
