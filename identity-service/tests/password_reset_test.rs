//! Password reset: enumeration-proof request path, durable single-use
//! tokens, session revocation on reset.

mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use identity_service::models::PasswordResetToken;
use identity_service::services::ServiceError;
use identity_service::storage::IdentityStore;
use identity_service::utils::sha256_hex;

#[tokio::test]
async fn request_for_unknown_email_succeeds_and_sends_nothing() {
    let app = TestApp::spawn().await;

    // Infallible by contract, and no mail goes out.
    app.state.reset.request("nobody@example.com").await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn request_for_sso_linked_account_sends_nothing() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("jane@example.com", "jane", "janepw-longenough")
        .await;
    app.store
        .link_sso_identity(auth.user.id, "google", "g-1")
        .await
        .unwrap();

    app.state.reset.request("jane@example.com").await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(app
        .mailer
        .sent()
        .iter()
        .all(|m| m.kind != "password_reset"));
}

#[tokio::test]
async fn full_reset_flow_revokes_sessions_and_consumes_the_token() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    app.state.reset.request("alice@example.com").await;

    let sent = app.mailer.sent();
    let mail = sent
        .iter()
        .find(|m| m.kind == "password_reset")
        .expect("reset email");
    let token = mail.token.clone().expect("token in email");

    app.state
        .reset
        .reset(&token, "brand-new-password")
        .await
        .expect("reset");

    // Sessions opened before the reset are dead.
    let refresh = app.state.login.refresh(&auth.refresh_token).await;
    assert!(matches!(refresh, Err(ServiceError::InvalidSession)));

    // New password works, old one does not.
    assert!(app
        .state
        .login
        .login("alice@example.com", "brand-new-password")
        .await
        .is_ok());
    assert!(matches!(
        app.state
            .login
            .login("alice@example.com", "alicepw-longenough")
            .await,
        Err(ServiceError::InvalidCredentials)
    ));

    // The token was consumed atomically; replay fails.
    let replay = app.state.reset.reset(&token, "yet-another-pass").await;
    assert!(matches!(replay, Err(ServiceError::InvalidResetToken)));
}

#[tokio::test]
async fn newer_request_replaces_the_previous_token() {
    let app = TestApp::spawn().await;
    app.register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    app.state.reset.request("alice@example.com").await;
    app.state.reset.request("alice@example.com").await;

    let sent = app.mailer.sent();
    let tokens: Vec<String> = sent
        .iter()
        .filter(|m| m.kind == "password_reset")
        .filter_map(|m| m.token.clone())
        .collect();
    assert_eq!(tokens.len(), 2);
    assert_ne!(tokens[0], tokens[1]);

    // At most one live token per account: the first one is void.
    let stale = app.state.reset.reset(&tokens[0], "new-password-one").await;
    assert!(matches!(stale, Err(ServiceError::InvalidResetToken)));

    app.state
        .reset
        .reset(&tokens[1], "new-password-two")
        .await
        .expect("latest token resets");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    let raw = "deadbeefdeadbeefdeadbeefdeadbeef";
    let mut record = PasswordResetToken::new(auth.user.id, sha256_hex(raw));
    record.expiry_utc = Utc::now() - Duration::minutes(1);
    app.store.replace_reset_token(&record).await.unwrap();

    let result = app.state.reset.reset(raw, "whatever-new-pass").await;
    assert!(matches!(result, Err(ServiceError::InvalidResetToken)));
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = TestApp::spawn().await;

    let result = app.state.reset.reset("not-a-real-token", "new-password").await;
    assert!(matches!(result, Err(ServiceError::InvalidResetToken)));
}
