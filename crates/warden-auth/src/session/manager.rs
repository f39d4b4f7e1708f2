//! Session orchestrator: registration, login, refresh rotation, logout,
//! OAuth and the administrative session operations.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_core::config::{AppConfig, AuthConfig};
use warden_core::result::AppResult;
use warden_core::traits::KeyValueStore;
use warden_database::Directory;
use warden_entity::{LoginEvent, NewLoginEvent, NewPrincipal, Principal};

use super::principal_cache::PrincipalCache;
use super::rate_limit::{RateLimiter, ROUTE_LOGIN, ROUTE_OAUTH, ROUTE_REFRESH, ROUTE_REGISTER};
use super::types::{ClientInfo, OAuthCompletion, OAuthStart, PrincipalSnapshot, TokenResponse};
use crate::bounded::directory_call;
use crate::error::{AuthError, AuthResult};
use crate::guard::AccountGuard;
use crate::jwt::{AccessClaims, TokenDecoder, TokenEncoder};
use crate::oauth::{ExternalIdentity, GoogleIdentityClient, IdentityProviderClient};
use crate::password::{PasswordHasher, PasswordValidator};
use crate::random::random_token;
use crate::rbac::{RbacResolver, ResolvedAccess, RoleAdmin};
use crate::revocation::{OAuthState, RevocationStore};

const METHOD_PASSWORD: &str = "password";
const TOKEN_TYPE: &str = "Bearer";

/// Token pair plus the refresh token id, kept internal so a lost
/// rotation race can revoke the pair it just issued.
struct IssuedSession {
    response: TokenResponse,
    token_id: String,
}

/// Composes the token codec, revocation store, account guard and RBAC
/// resolver into the public authentication flows.
///
/// Cheap to clone; share one instance per process.
#[derive(Clone)]
pub struct SessionManager {
    auth_config: AuthConfig,
    directory: Directory,
    encoder: TokenEncoder,
    decoder: TokenDecoder,
    hasher: PasswordHasher,
    validator: PasswordValidator,
    revocations: RevocationStore,
    rate_limiter: RateLimiter,
    guard: AccountGuard,
    resolver: RbacResolver,
    roles: RoleAdmin,
    principals: PrincipalCache,
    identity_provider: Option<Arc<dyn IdentityProviderClient>>,
    oauth_state_ttl: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("issuer", &self.auth_config.issuer)
            .field("default_role", &self.auth_config.default_role)
            .field(
                "identity_provider",
                &self.identity_provider.as_ref().map(|p| p.provider_name()),
            )
            .finish()
    }
}

impl SessionManager {
    /// Build the orchestrator from configuration.
    ///
    /// The Google client is wired in when `oauth.google` is configured.
    pub fn new(
        config: &AppConfig,
        directory: Directory,
        store: Arc<dyn KeyValueStore>,
    ) -> AuthResult<Self> {
        let directory_timeout = config.auth.directory_timeout();
        let revocations = RevocationStore::new(store);

        let identity_provider: Option<Arc<dyn IdentityProviderClient>> =
            if config.oauth.google.is_configured() {
                Some(Arc::new(GoogleIdentityClient::new(&config.oauth.google)?))
            } else {
                None
            };

        Ok(Self {
            auth_config: config.auth.clone(),
            encoder: TokenEncoder::new(&config.auth),
            decoder: TokenDecoder::new(&config.auth),
            hasher: PasswordHasher::new(),
            validator: PasswordValidator::new(&config.security),
            rate_limiter: RateLimiter::new(revocations.clone(), &config.security),
            guard: AccountGuard::new(
                directory.principals.clone(),
                &config.security,
                directory_timeout,
            ),
            resolver: RbacResolver::new(directory.roles.clone(), directory_timeout),
            roles: RoleAdmin::new(directory.clone(), directory_timeout),
            principals: PrincipalCache::new(&config.auth),
            revocations,
            directory,
            identity_provider,
            oauth_state_ttl: config.oauth.google.state_ttl(),
        })
    }

    /// Replace the identity provider client.
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProviderClient>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Replace the password hasher (e.g. with cheaper parameters).
    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Role and permission administration bound to the same directory.
    pub fn roles(&self) -> &RoleAdmin {
        &self.roles
    }

    /// Token verification with the configured key, issuer and leeway.
    pub fn decoder(&self) -> &TokenDecoder {
        &self.decoder
    }

    // ── Registration and password login ───────────────────

    /// Create a password principal holding the default role.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        client: &ClientInfo,
    ) -> AuthResult<PrincipalSnapshot> {
        let email = normalize_email(email);
        self.validator.validate(password)?;
        self.rate_limiter.check(ROUTE_REGISTER, &email).await?;

        let existing = self
            .call("find_by_email", self.directory.principals.find_by_email(&email))
            .await?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash_password(password).await?;
        let new = NewPrincipal {
            email,
            name: name.trim().to_string(),
            password_hash: Some(password_hash),
            provider: None,
            provider_subject: None,
            role_id: self.default_role_id().await?,
            verified: false,
        };
        let principal = self
            .call("create_principal", self.directory.principals.create(&new))
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::EmailTaken
                } else {
                    AuthError::from(e)
                }
            })?;

        info!(
            principal_id = %principal.id,
            ip = client.ip_address.as_deref().unwrap_or("-"),
            "Principal registered"
        );
        self.snapshot(&principal).await
    }

    /// Authenticate with email and password and issue a token pair.
    ///
    /// Unknown email and wrong password are indistinguishable. The attempt
    /// that reaches the failure threshold is answered with
    /// [`AuthError::AccountLocked`].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> AuthResult<TokenResponse> {
        let email = normalize_email(email);
        self.rate_limiter.check(ROUTE_LOGIN, &email).await?;

        let principal = self
            .call("find_by_email", self.directory.principals.find_by_email(&email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let now = Utc::now();

        if !principal.active {
            self.record_login(&principal, METHOD_PASSWORD, client, Some("inactive"))
                .await;
            return Err(AuthError::AccountInactive);
        }

        if let Err(err) = self.guard.admit(&principal, now).await {
            if matches!(err, AuthError::AccountLocked { .. }) {
                self.record_login(&principal, METHOD_PASSWORD, client, Some("locked"))
                    .await;
            }
            return Err(err);
        }

        let verified = match principal.password_hash.as_deref() {
            Some(hash) if !hash.is_empty() => self.hasher.verify_password(password, hash).await?,
            _ => false,
        };

        if !verified {
            let outcome = self.guard.record_failure(principal.id, now).await?;
            self.principals.invalidate(principal.id).await;
            self.record_login(&principal, METHOD_PASSWORD, client, Some("invalid_password"))
                .await;
            return Err(match outcome.locked_until {
                Some(until) => AuthError::AccountLocked { until },
                None => AuthError::InvalidCredentials,
            });
        }

        self.guard.record_success(&principal).await?;
        let principal = self.mark_logged_in(principal, now).await?;
        self.record_login(&principal, METHOD_PASSWORD, client, None)
            .await;

        let session = self.issue_session(&principal, now).await?;
        info!(principal_id = %principal.id, "Login successful");
        Ok(session.response)
    }

    // ── Refresh and logout ─────────────────────────────────

    /// Exchange a refresh token for a new pair, revoking the old one.
    ///
    /// The new pair is recorded before the old id is consumed, so a store
    /// failure part-way leaves the presented token usable. When two
    /// callers race on the same token only the consume winner keeps its
    /// pair; the loser's new id is revoked.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let claims = self.decoder.verify_refresh(refresh_token)?;
        let principal_id = claims.sub;
        self.rate_limiter
            .check(ROUTE_REFRESH, &principal_id.to_string())
            .await?;

        let status = self
            .revocations
            .check_revocation(principal_id, &claims.jti)
            .await?;
        if !status.is_valid() {
            debug!(principal_id = %principal_id, status = ?status, "Refresh token rejected");
            return Err(AuthError::TokenRevoked);
        }

        let principal = self
            .call("find_by_id", self.directory.principals.find_by_id(principal_id))
            .await?
            .ok_or_else(|| AuthError::InvalidToken("unknown principal".into()))?;
        if !principal.active {
            return Err(AuthError::AccountInactive);
        }
        self.principals.insert(principal.clone()).await;

        let issued = self.issue_session(&principal, Utc::now()).await?;

        if !self.revocations.consume(principal_id, &claims.jti).await? {
            warn!(principal_id = %principal_id, "Refresh token replayed concurrently");
            self.revocations
                .revoke(principal_id, &issued.token_id, self.refresh_ttl())
                .await?;
            return Err(AuthError::TokenRevoked);
        }

        info!(principal_id = %principal_id, "Refresh token rotated");
        Ok(issued.response)
    }

    /// Revoke the presented refresh token and drop cached session data.
    ///
    /// An already expired token is accepted so clients can always log out.
    pub async fn logout(&self, principal_id: Uuid, refresh_token: &str) -> AuthResult<()> {
        let claims = self.decoder.decode_refresh_for_logout(refresh_token)?;
        if claims.sub != principal_id {
            return Err(AuthError::InvalidToken("token subject mismatch".into()));
        }

        self.revocations
            .revoke(principal_id, &claims.jti, claims.remaining_at(Utc::now()))
            .await?;
        self.revocations.clear_session(principal_id).await?;
        self.principals.invalidate(principal_id).await;

        info!(principal_id = %principal_id, "Logged out");
        Ok(())
    }

    // ── OAuth ──────────────────────────────────────────────

    /// Store a one-time state and return the provider's authorization URL.
    pub async fn begin_oauth(&self, redirect_to: Option<String>) -> AuthResult<OAuthStart> {
        let provider = self.identity_provider()?;
        let state = random_token();

        self.revocations
            .put_oauth_state(
                &OAuthState {
                    state: state.clone(),
                    redirect_to,
                    created_at: Utc::now(),
                },
                self.oauth_state_ttl,
            )
            .await?;

        let authorization_url = provider.authorization_url(&state)?;
        Ok(OAuthStart {
            state,
            authorization_url,
        })
    }

    /// Handle the provider callback. The state is consumed whether or not
    /// the code exchange succeeds.
    pub async fn complete_oauth(
        &self,
        state: &str,
        code: &str,
        client: &ClientInfo,
    ) -> AuthResult<OAuthCompletion> {
        let stored = self
            .revocations
            .take_oauth_state(state)
            .await?
            .ok_or(AuthError::InvalidOAuthState)?;

        let tokens = self.oauth_login(code, client).await?;
        Ok(OAuthCompletion {
            tokens,
            redirect_to: stored.redirect_to,
        })
    }

    /// Exchange a code, then find, link or provision the principal.
    pub async fn oauth_login(&self, code: &str, client: &ClientInfo) -> AuthResult<TokenResponse> {
        let provider = self.identity_provider()?;
        let mut identity = provider.exchange_code(code).await?;
        identity.email = normalize_email(&identity.email);
        self.rate_limiter
            .check(ROUTE_OAUTH, &identity.email)
            .await?;

        let principal = self.resolve_external(&identity).await?;
        if !principal.active {
            self.record_login(&principal, &identity.provider, client, Some("inactive"))
                .await;
            return Err(AuthError::AccountInactive);
        }

        let now = Utc::now();
        let principal = self.mark_logged_in(principal, now).await?;
        self.record_login(&principal, &identity.provider, client, None)
            .await;

        let session = self.issue_session(&principal, now).await?;
        info!(
            principal_id = %principal.id,
            provider = %identity.provider,
            "OAuth login successful"
        );
        Ok(session.response)
    }

    async fn resolve_external(&self, identity: &ExternalIdentity) -> AuthResult<Principal> {
        let linked = self
            .call(
                "find_by_provider_id",
                self.directory
                    .principals
                    .find_by_provider_id(&identity.provider, &identity.subject),
            )
            .await?;
        if let Some(principal) = linked {
            return Ok(principal);
        }

        if let Some(principal) = self.find_by_email(&identity.email).await? {
            return self.link(principal, identity).await;
        }

        let new = NewPrincipal {
            email: identity.email.clone(),
            name: identity.name.clone(),
            password_hash: None,
            provider: Some(identity.provider.clone()),
            provider_subject: Some(identity.subject.clone()),
            role_id: self.default_role_id().await?,
            verified: identity.email_verified,
        };
        match self
            .call("create_principal", self.directory.principals.create(&new))
            .await
        {
            Ok(principal) => {
                info!(principal_id = %principal.id, provider = %identity.provider, "Principal provisioned");
                Ok(principal)
            }
            Err(e) if e.is_conflict() => {
                debug!(provider = %identity.provider, "Concurrent provisioning, linking instead");
                let principal = self
                    .find_by_email(&identity.email)
                    .await?
                    .ok_or(AuthError::EmailTaken)?;
                self.link(principal, identity).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Attach the external identity to an existing principal found by
    /// email. Only a provider-verified email may claim an existing account.
    async fn link(&self, principal: Principal, identity: &ExternalIdentity) -> AuthResult<Principal> {
        if principal.is_linked_to(&identity.provider, &identity.subject) {
            return Ok(principal);
        }
        if !identity.email_verified {
            warn!(
                principal_id = %principal.id,
                provider = %identity.provider,
                "Refusing to link identity with unverified email"
            );
            return Err(AuthError::EmailTaken);
        }

        let principal = self
            .call(
                "link_provider",
                self.directory.principals.link_provider(
                    principal.id,
                    &identity.provider,
                    &identity.subject,
                    identity.email_verified,
                ),
            )
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;
        self.principals.invalidate(principal.id).await;
        info!(principal_id = %principal.id, provider = %identity.provider, "Identity linked");
        Ok(principal)
    }

    // ── Token validation and authorization ─────────────────

    /// Verify an access token. Stateless: no store or directory access.
    pub fn validate_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        Ok(self.decoder.verify_access(token)?)
    }

    /// Flattened `resource:action` grants of the principal's current role.
    pub async fn effective_permissions(&self, principal_id: Uuid) -> AuthResult<BTreeSet<String>> {
        let principal = self.load_principal(principal_id).await?;
        self.resolver.effective_permissions(&principal).await
    }

    /// Whether the principal's role grants `resource:action`, directly or
    /// through `resource:manage`.
    pub async fn authorize(
        &self,
        principal_id: Uuid,
        resource: &str,
        action: &str,
    ) -> AuthResult<bool> {
        let principal = self.load_principal(principal_id).await?;
        self.resolver.authorize(&principal, resource, action).await
    }

    // ── Administration ─────────────────────────────────────

    /// Fresh directory view of a principal and its resolved access.
    pub async fn principal_snapshot(&self, principal_id: Uuid) -> AuthResult<PrincipalSnapshot> {
        let principal = self.fetch_principal(principal_id).await?;
        self.snapshot(&principal).await
    }

    /// Look a principal up by email and return its snapshot.
    pub async fn principal_snapshot_by_email(&self, email: &str) -> AuthResult<PrincipalSnapshot> {
        let principal = self
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;
        self.snapshot(&principal).await
    }

    /// Most recent login events, newest first.
    pub async fn login_history(&self, principal_id: Uuid, limit: u32) -> AuthResult<Vec<LoginEvent>> {
        Ok(self
            .call(
                "recent_login_events",
                self.directory
                    .principals
                    .recent_login_events(principal_id, limit),
            )
            .await?)
    }

    /// Point the principal at another role. Takes effect on the next
    /// authorization check; existing access tokens keep their role label.
    pub async fn assign_role(&self, principal_id: Uuid, role_id: Uuid) -> AuthResult<PrincipalSnapshot> {
        let role = self
            .call("find_role", self.directory.roles.find_by_id(role_id))
            .await?
            .ok_or(AuthError::RoleNotFound)?;

        let updated = self
            .call(
                "set_role",
                self.directory.principals.set_role(principal_id, Some(role.id)),
            )
            .await?;
        if !updated {
            return Err(AuthError::PrincipalNotFound);
        }
        self.principals.invalidate(principal_id).await;

        info!(principal_id = %principal_id, role = %role.name, "Role assigned");
        self.principal_snapshot(principal_id).await
    }

    /// Enable or disable a principal.
    ///
    /// Disabling also revokes every outstanding refresh token, so the
    /// principal is signed out everywhere once its access tokens expire.
    pub async fn set_active(&self, principal_id: Uuid, active: bool) -> AuthResult<PrincipalSnapshot> {
        let updated = self
            .call(
                "set_active",
                self.directory.principals.set_active(principal_id, active),
            )
            .await?;
        if !updated {
            return Err(AuthError::PrincipalNotFound);
        }
        self.principals.invalidate(principal_id).await;

        if active {
            info!(principal_id = %principal_id, "Principal enabled");
        } else {
            let revoked = self.revoke_all_sessions(principal_id).await?;
            info!(principal_id = %principal_id, count = revoked, "Principal disabled");
        }
        self.principal_snapshot(principal_id).await
    }

    /// Every principal with its resolved access, oldest first, optionally
    /// only the holders of one role.
    pub async fn list_principals(&self, role_id: Option<Uuid>) -> AuthResult<Vec<PrincipalSnapshot>> {
        let principals = self
            .call("list_principals", self.directory.principals.list(role_id))
            .await?;

        let mut snapshots = Vec::with_capacity(principals.len());
        for principal in &principals {
            snapshots.push(self.snapshot(principal).await?);
        }
        Ok(snapshots)
    }

    /// Revoke every outstanding refresh token of a principal.
    pub async fn revoke_all_sessions(&self, principal_id: Uuid) -> AuthResult<usize> {
        let count = self.revocations.revoke_all(principal_id).await?;
        self.revocations.clear_session(principal_id).await?;
        self.principals.invalidate(principal_id).await;
        Ok(count)
    }

    /// Clear the failed-attempt counter and any lock.
    pub async fn unlock(&self, principal_id: Uuid) -> AuthResult<()> {
        self.fetch_principal(principal_id).await?;
        self.guard.unlock(principal_id).await?;
        self.principals.invalidate(principal_id).await;
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────

    async fn issue_session(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedSession> {
        let access = self.resolver.resolve(principal).await?;
        let role = access.role_name().map(str::to_string);

        let access_token =
            self.encoder
                .issue_access_at(principal.id, &principal.email, role.as_deref(), now)?;
        let token_id = random_token();
        let refresh_token = self.encoder.issue_refresh_at(principal.id, &token_id, now)?;

        self.revocations
            .put_revocation(principal.id, &token_id, self.refresh_ttl())
            .await?;

        let snapshot = snapshot_of(principal, access);
        if let Err(e) = self
            .revocations
            .put_session(principal.id, &snapshot, self.refresh_ttl())
            .await
        {
            warn!(principal_id = %principal.id, error = %e, "Failed to cache session data");
        }

        Ok(IssuedSession {
            response: TokenResponse {
                access_token: access_token.token,
                refresh_token: refresh_token.token,
                token_type: TOKEN_TYPE.to_string(),
                expires_in: self.encoder.access_ttl().num_seconds(),
                refresh_expires_in: self.encoder.refresh_ttl().num_seconds(),
                access_expires_at: access_token.expires_at,
                refresh_expires_at: refresh_token.expires_at,
                principal: snapshot,
            },
            token_id,
        })
    }

    async fn snapshot(&self, principal: &Principal) -> AuthResult<PrincipalSnapshot> {
        let access = self.resolver.resolve(principal).await?;
        Ok(snapshot_of(principal, access))
    }

    async fn mark_logged_in(&self, mut principal: Principal, now: DateTime<Utc>) -> AuthResult<Principal> {
        self.call(
            "update_last_login",
            self.directory.principals.update_last_login(principal.id, now),
        )
        .await?;
        principal.last_login_at = Some(now);
        principal.failed_login_attempts = 0;
        principal.locked_until = None;
        self.principals.invalidate(principal.id).await;
        Ok(principal)
    }

    /// Login events are an audit trail; failing to write one never blocks
    /// the login itself.
    async fn record_login(
        &self,
        principal: &Principal,
        method: &str,
        client: &ClientInfo,
        failure_reason: Option<&str>,
    ) {
        let event = NewLoginEvent {
            principal_id: principal.id,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            method: method.to_string(),
            success: failure_reason.is_none(),
            failure_reason: failure_reason.map(str::to_string),
        };
        if let Err(e) = self
            .call(
                "record_login_event",
                self.directory.principals.record_login_event(&event),
            )
            .await
        {
            warn!(principal_id = %principal.id, error = %e, "Failed to record login event");
        }
    }

    async fn default_role_id(&self) -> AuthResult<Option<Uuid>> {
        let name = &self.auth_config.default_role;
        let role = self
            .call("find_role_by_name", self.directory.roles.find_by_name(name))
            .await?;
        if role.is_none() {
            warn!(role = %name, "Default role missing; principal created without a role");
        }
        Ok(role.map(|r| r.id))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Principal>> {
        Ok(self
            .call("find_by_email", self.directory.principals.find_by_email(email))
            .await?)
    }

    /// Directory read, bypassing the cache.
    async fn fetch_principal(&self, id: Uuid) -> AuthResult<Principal> {
        self.call("find_by_id", self.directory.principals.find_by_id(id))
            .await?
            .ok_or(AuthError::PrincipalNotFound)
    }

    /// Cached read for authorization paths.
    async fn load_principal(&self, id: Uuid) -> AuthResult<Principal> {
        if let Some(principal) = self.principals.get(id).await {
            return Ok(principal);
        }
        let principal = self.fetch_principal(id).await?;
        self.principals.insert(principal.clone()).await;
        Ok(principal)
    }

    fn identity_provider(&self) -> AuthResult<&Arc<dyn IdentityProviderClient>> {
        self.identity_provider
            .as_ref()
            .ok_or_else(|| AuthError::IdentityProvider("no identity provider configured".into()))
    }

    fn refresh_ttl(&self) -> Duration {
        self.auth_config.refresh_ttl()
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        directory_call(self.auth_config.directory_timeout(), operation, fut).await
    }
}

fn snapshot_of(principal: &Principal, access: ResolvedAccess) -> PrincipalSnapshot {
    let role = access.role_name().map(str::to_string);
    PrincipalSnapshot::new(principal, role, access.permissions)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
