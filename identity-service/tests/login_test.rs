//! Credential-step behavior: registration, login, the generic failure mode.

mod common;

use common::TestApp;
use identity_service::services::{LoginOutcome, ServiceError};
use identity_service::storage::IdentityStore;

#[tokio::test]
async fn register_then_login_yields_tokens() {
    let app = TestApp::spawn().await;
    app.register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    let outcome = app
        .state
        .login
        .login("alice@example.com", "alicepw-longenough")
        .await
        .expect("login");

    let LoginOutcome::Authenticated(auth) = outcome else {
        panic!("expected tokens for an account without MFA");
    };
    assert!(!auth.access_token.is_empty());
    assert!(!auth.refresh_token.is_empty());
    assert_eq!(auth.user.email, "alice@example.com");
    assert_eq!(auth.user.username, "alice");
    assert!(!auth.user.mfa_enabled);
}

#[tokio::test]
async fn register_rejects_duplicate_email_and_username() {
    let app = TestApp::spawn().await;
    app.register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    let dup_email = app
        .state
        .login
        .register(identity_service::dtos::auth::RegisterRequest {
            email: "alice@example.com".to_string(),
            username: "different".to_string(),
            password: "password123".to_string(),
            first_name: None,
            last_name: None,
        })
        .await;
    assert!(matches!(dup_email, Err(ServiceError::Conflict(_))));

    let dup_username = app
        .state
        .login
        .register(identity_service::dtos::auth::RegisterRequest {
            email: "other@example.com".to_string(),
            username: "alice".to_string(),
            password: "password123".to_string(),
            first_name: None,
            last_name: None,
        })
        .await;
    assert!(matches!(dup_username, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn unknown_account_wrong_password_and_inactive_account_fail_identically() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    let unknown = app
        .state
        .login
        .login("nobody@example.com", "whatever")
        .await;
    assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));

    let wrong = app
        .state
        .login
        .login("alice@example.com", "not-her-password")
        .await;
    assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

    app.store
        .set_account_active(auth.user.id, false)
        .await
        .unwrap();
    let inactive = app
        .state
        .login
        .login("alice@example.com", "alicepw-longenough")
        .await;
    assert!(matches!(inactive, Err(ServiceError::InvalidCredentials)));
}

#[tokio::test]
async fn sso_only_account_cannot_password_authenticate() {
    let app = TestApp::spawn().await;

    let mut account = identity_service::models::Account::new(
        "ssoonly@example.com".to_string(),
        "ssoonly".to_string(),
        None,
    );
    account.sso_provider = Some("google".to_string());
    account.sso_subject = Some("g-123".to_string());
    app.store.insert_account(&account).await.unwrap();

    let result = app.state.login.login("ssoonly@example.com", "").await;
    assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
}

#[tokio::test]
async fn change_password_revokes_open_sessions() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    let wrong_current = app
        .state
        .login
        .change_password(auth.user.id, "not-current", "new-password-123")
        .await;
    assert!(matches!(
        wrong_current,
        Err(ServiceError::InvalidCredentials)
    ));

    app.state
        .login
        .change_password(auth.user.id, "alicepw-longenough", "new-password-123")
        .await
        .expect("change password");

    // Old refresh token dies with the change.
    let refresh = app.state.login.refresh(&auth.refresh_token).await;
    assert!(matches!(refresh, Err(ServiceError::InvalidSession)));

    // Old password no longer works, the new one does.
    assert!(matches!(
        app.state
            .login
            .login("alice@example.com", "alicepw-longenough")
            .await,
        Err(ServiceError::InvalidCredentials)
    ));
    assert!(app
        .state
        .login
        .login("alice@example.com", "new-password-123")
        .await
        .is_ok());
}
