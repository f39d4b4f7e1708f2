//! OAuth state handling, provisioning and account linking.

mod helpers;

use helpers::{TestApp, google_identity};
use warden_auth::AuthError;

#[tokio::test]
async fn test_oauth_provisions_principal_with_default_role() {
    let app = TestApp::new().await;
    app.idp
        .script("code-1", google_identity("g-100", "xena@example.com"));

    let start = app
        .manager
        .begin_oauth(Some("/dashboard".into()))
        .await
        .unwrap();
    assert!(start.authorization_url.contains(&start.state));

    let done = app
        .manager
        .complete_oauth(&start.state, "code-1", &TestApp::client())
        .await
        .unwrap();

    assert_eq!(done.redirect_to.as_deref(), Some("/dashboard"));
    let principal = &done.tokens.principal;
    assert_eq!(principal.email, "xena@example.com");
    assert_eq!(principal.role.as_deref(), Some("user"));
    assert_eq!(principal.provider.as_deref(), Some("google"));
    assert!(principal.verified);
}

#[tokio::test]
async fn test_oauth_state_is_single_use() {
    let app = TestApp::new().await;
    app.idp
        .script("code-1", google_identity("g-101", "yuri@example.com"));
    let start = app.manager.begin_oauth(None).await.unwrap();

    app.manager
        .complete_oauth(&start.state, "code-1", &TestApp::client())
        .await
        .unwrap();
    assert_eq!(
        app.manager
            .complete_oauth(&start.state, "code-1", &TestApp::client())
            .await
            .unwrap_err(),
        AuthError::InvalidOAuthState
    );
    assert_eq!(
        app.manager
            .complete_oauth("never-issued", "code-1", &TestApp::client())
            .await
            .unwrap_err(),
        AuthError::InvalidOAuthState
    );
}

#[tokio::test]
async fn test_oauth_links_existing_password_principal() {
    let app = TestApp::new().await;
    let id = app.register("zoe@example.com").await;
    app.idp
        .script("code-1", google_identity("g-102", "zoe@example.com"));

    let tokens = app
        .manager
        .oauth_login("code-1", &TestApp::client())
        .await
        .unwrap();
    assert_eq!(tokens.principal.id, id);

    let principal = app.principal(id).await;
    assert!(principal.is_linked_to("google", "g-102"));
    assert!(principal.has_password());

    // The link is found by provider subject even if the email changes upstream.
    app.idp
        .script("code-2", google_identity("g-102", "zoe.new@example.com"));
    let again = app
        .manager
        .oauth_login("code-2", &TestApp::client())
        .await
        .unwrap();
    assert_eq!(again.principal.id, id);
}

#[tokio::test]
async fn test_provider_failure_surfaces() {
    let app = TestApp::new().await;
    assert!(matches!(
        app.manager
            .oauth_login("unknown-code", &TestApp::client())
            .await,
        Err(AuthError::IdentityProvider(_))
    ));
}

#[tokio::test]
async fn test_oauth_principal_cannot_password_login() {
    let app = TestApp::new().await;
    app.idp
        .script("code-1", google_identity("g-103", "abe@example.com"));
    app.manager
        .oauth_login("code-1", &TestApp::client())
        .await
        .unwrap();

    assert_eq!(
        app.manager
            .login("abe@example.com", helpers::PASSWORD, &TestApp::client())
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
}

#[tokio::test]
async fn test_unverified_email_cannot_claim_existing_account() {
    let app = TestApp::new().await;
    let id = app.register("yuri@example.com").await;

    let mut identity = google_identity("g-300", "yuri@example.com");
    identity.email_verified = false;
    app.idp.script("code-unverified", identity);

    let err = app
        .manager
        .oauth_login("code-unverified", &TestApp::client())
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::EmailTaken);

    let principal = app.principal(id).await;
    assert!(principal.provider.is_none());
    assert!(principal.provider_subject.is_none());
    app.login("yuri@example.com").await;
}

#[tokio::test]
async fn test_linking_does_not_reactivate_disabled_principal() {
    let app = TestApp::new().await;
    let id = app.register("zora@example.com").await;
    app.manager.set_active(id, false).await.unwrap();
    app.idp
        .script("code-zora", google_identity("g-400", "zora@example.com"));

    let err = app
        .manager
        .oauth_login("code-zora", &TestApp::client())
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::AccountInactive);

    let principal = app.principal(id).await;
    assert!(principal.is_linked_to("google", "g-400"));
    assert!(!principal.active);
}
