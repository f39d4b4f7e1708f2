//! Shared fixtures for the flow tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use warden_auth::{
    AuthError, AuthResult, ClientInfo, ExternalIdentity, IdentityProviderClient, PasswordHasher,
    SessionManager, TokenResponse, bootstrap_defaults,
};
use warden_cache::StoreManager;
use warden_core::config::AppConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::KeyValueStore;
use warden_database::{Directory, MemoryDirectory, PrincipalRepository};
use warden_entity::Principal;

pub const PASSWORD: &str = "Abc12345!";

/// Identity provider answering from a fixed code → identity table.
#[derive(Debug, Default)]
pub struct ScriptedIdentityProvider {
    identities: Mutex<HashMap<String, ExternalIdentity>>,
}

impl ScriptedIdentityProvider {
    pub fn script(&self, code: &str, identity: ExternalIdentity) {
        self.identities
            .lock()
            .unwrap()
            .insert(code.to_string(), identity);
    }
}

#[async_trait]
impl IdentityProviderClient for ScriptedIdentityProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        Ok(format!("https://idp.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<ExternalIdentity> {
        self.identities
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| AuthError::IdentityProvider("invalid_grant".into()))
    }
}

/// In-memory store whose operations can be switched to fail.
///
/// Operations are named after the [`KeyValueStore`] method they gate.
#[derive(Debug)]
pub struct OutageStore {
    inner: StoreManager,
    failing: Mutex<HashSet<&'static str>>,
}

impl OutageStore {
    pub fn new() -> Self {
        Self {
            inner: StoreManager::in_memory(),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn gate(&self, op: &'static str) -> AppResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(AppError::cache(format!("{op}: connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for OutageStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.gate("get")?;
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.gate("set")?;
        self.inner.set(key, value, ttl).await
    }
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.gate("set_nx")?;
        self.inner.set_nx(key, value, ttl).await
    }
    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> AppResult<bool> {
        self.gate("compare_and_swap")?;
        self.inner.compare_and_swap(key, expected, new).await
    }
    async fn replace_existing(&self, key: &str, value: &str) -> AppResult<bool> {
        self.gate("replace_existing")?;
        self.inner.replace_existing(key, value).await
    }
    async fn take(&self, key: &str) -> AppResult<Option<String>> {
        self.gate("take")?;
        self.inner.take(key).await
    }
    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.gate("delete")?;
        self.inner.delete(key).await
    }
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<u64> {
        self.gate("incr_window")?;
        self.inner.incr_window(key, window).await
    }
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> AppResult<()> {
        self.gate("set_add")?;
        self.inner.set_add(key, member, ttl).await
    }
    async fn set_remove(&self, key: &str, member: &str) -> AppResult<bool> {
        self.gate("set_remove")?;
        self.inner.set_remove(key, member).await
    }
    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        self.gate("set_members")?;
        self.inner.set_members(key).await
    }
    async fn health_check(&self) -> AppResult<bool> {
        self.gate("health_check")?;
        self.inner.health_check().await
    }
}

/// Orchestrator wired to in-memory backends with the default catalog.
pub struct TestApp {
    pub manager: SessionManager,
    pub directory: MemoryDirectory,
    pub idp: Arc<ScriptedIdentityProvider>,
    pub store: Arc<OutageStore>,
    pub config: AppConfig,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let directory = MemoryDirectory::new();
        let store = Arc::new(OutageStore::new());
        let idp = Arc::new(ScriptedIdentityProvider::default());

        let manager = SessionManager::new(&config, Directory::memory(directory.clone()), store.clone())
            .expect("Failed to build session manager")
            .with_password_hasher(PasswordHasher::insecure_fast().expect("argon2 params"))
            .with_identity_provider(idp.clone());

        bootstrap_defaults(manager.roles())
            .await
            .expect("Failed to bootstrap catalog");

        Self {
            manager,
            directory,
            idp,
            store,
            config,
        }
    }

    pub fn client() -> ClientInfo {
        ClientInfo::new("127.0.0.1", "warden-tests")
    }

    /// Register a principal and return its id.
    pub async fn register(&self, email: &str) -> Uuid {
        self.manager
            .register(email, PASSWORD, "Test User", &Self::client())
            .await
            .expect("registration failed")
            .id
    }

    pub async fn login(&self, email: &str) -> TokenResponse {
        self.manager
            .login(email, PASSWORD, &Self::client())
            .await
            .expect("login failed")
    }

    pub async fn principal(&self, id: Uuid) -> Principal {
        self.directory
            .find_by_id(id)
            .await
            .unwrap()
            .expect("principal exists")
    }

    pub async fn role_id(&self, name: &str) -> Uuid {
        self.manager
            .roles()
            .get_role_by_name(name)
            .await
            .expect("role exists")
            .role
            .id
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "integration-test-secret".into();
    config
}

pub fn google_identity(subject: &str, email: &str) -> ExternalIdentity {
    ExternalIdentity {
        provider: "google".into(),
        subject: subject.into(),
        email: email.into(),
        email_verified: true,
        name: "Google User".into(),
    }
}
