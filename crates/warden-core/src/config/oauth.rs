//! External identity provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identity provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Google OAuth2 / OpenID Connect client.
    #[serde(default)]
    pub google: GoogleOAuthConfig,
}

/// Google OAuth2 client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Callback URL registered with the provider.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    /// Lifetime of a one-time state value, in minutes.
    #[serde(default = "default_state_ttl")]
    pub state_ttl_minutes: u64,
    /// Upper bound for each request to the provider, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GoogleOAuthConfig {
    /// Whether a client id and secret have been supplied.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GoogleOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: default_redirect_url(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            state_ttl_minutes: default_state_ttl(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_redirect_url() -> String {
    "http://localhost:8080/api/v1/auth/oauth/google/callback".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v3/userinfo".to_string()
}

fn default_state_ttl() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    10
}
