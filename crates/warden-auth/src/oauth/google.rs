//! Google OAuth 2.0 / OpenID Connect client.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use warden_core::config::GoogleOAuthConfig;

use super::provider::{ExternalIdentity, IdentityProviderClient};
use crate::error::{AuthError, AuthResult};

const PROVIDER: &str = "google";
const SCOPES: &str = "openid email profile";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

/// Authorization-code flow against Google's endpoints.
#[derive(Debug, Clone)]
pub struct GoogleIdentityClient {
    http: reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleIdentityClient {
    /// Build a client whose requests are bounded by the configured timeout.
    pub fn new(config: &GoogleOAuthConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    async fn fetch_access_token(&self, code: &str) -> AuthResult<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| provider_error(format!("Token exchange failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(provider_error(format!(
                "Token exchange HTTP {status}: {body}"
            )));
        }

        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| provider_error(format!("Token response parse error: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let resp = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| provider_error(format!("Userinfo request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(provider_error(format!("Userinfo HTTP {status}")));
        }

        resp.json::<UserInfo>()
            .await
            .map_err(|e| provider_error(format!("Userinfo parse error: {e}")))
    }
}

#[async_trait]
impl IdentityProviderClient for GoogleIdentityClient {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Internal(format!("Invalid authorization endpoint: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<ExternalIdentity> {
        let access_token = self.fetch_access_token(code).await?;
        let info = self.fetch_user_info(&access_token).await?;

        let Some(email) = info.email.filter(|e| !e.is_empty()) else {
            return Err(provider_error("Provider did not return an email address"));
        };
        debug!(provider = PROVIDER, "Exchanged authorization code");

        Ok(ExternalIdentity {
            provider: PROVIDER.to_string(),
            subject: info.sub,
            name: info.name.unwrap_or_else(|| email.clone()),
            email: email.to_lowercase(),
            email_verified: info.email_verified,
        })
    }
}

fn provider_error(message: impl Into<String>) -> AuthError {
    let message = message.into();
    warn!(provider = PROVIDER, error = %message, "Identity provider call failed");
    AuthError::IdentityProvider(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_carries_state() {
        let client = GoogleIdentityClient::new(&GoogleOAuthConfig {
            client_id: "client-123".into(),
            ..GoogleOAuthConfig::default()
        })
        .unwrap();

        let url = Url::parse(&client.authorization_url("st-42").unwrap()).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(query["state"], "st-42");
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["scope"], "openid email profile");
        assert_eq!(query["access_type"], "offline");
    }

    #[test]
    fn test_userinfo_defaults_unverified() {
        let info: UserInfo =
            serde_json::from_str(r#"{"sub":"1","email":"a@example.com"}"#).unwrap();
        assert!(!info.email_verified);
        assert_eq!(info.name, None);
    }
}
