//! Identity provider abstraction consumed by the session orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;

/// Identity asserted by an external provider after a code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider name, e.g. `"google"`.
    pub provider: String,
    /// Stable subject identifier issued by the provider.
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: String,
}

/// An OAuth 2.0 authorization-code identity provider.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync + std::fmt::Debug + 'static {
    /// Name stored on linked principals.
    fn provider_name(&self) -> &str;

    /// URL the user agent is sent to, carrying `state`.
    fn authorization_url(&self, state: &str) -> AuthResult<String>;

    /// Exchange an authorization code for the caller's identity.
    async fn exchange_code(&self, code: &str) -> AuthResult<ExternalIdentity>;
}
