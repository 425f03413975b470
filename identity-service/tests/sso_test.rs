//! SSO account resolution: subject match, email linking, account creation,
//! username collisions, and the post-credential handoff.

mod common;

use common::{current_totp_code, TestApp};
use identity_service::services::{LoginOutcome, ServiceError, SsoUserInfo};
use identity_service::storage::IdentityStore;

fn provider_identity(subject: &str, email: &str, name: Option<&str>) -> SsoUserInfo {
    SsoUserInfo {
        subject: subject.to_string(),
        email: email.to_string(),
        display_name: name.map(str::to_string),
        first_name: None,
        last_name: None,
        avatar_url: None,
    }
}

#[tokio::test]
async fn unknown_identity_creates_an_individual_account() {
    let app = TestApp::spawn().await;

    let info = provider_identity("g-1", "jane@example.com", Some("Jane Doe"));
    let account = app
        .state
        .sso
        .resolve_account("google", &info)
        .await
        .expect("resolve");

    assert_eq!(account.email, "jane@example.com");
    assert_eq!(account.username, "janedoe");
    assert_eq!(account.sso_provider.as_deref(), Some("google"));
    assert_eq!(account.sso_subject.as_deref(), Some("g-1"));
    assert!(account.password_hash.is_none());
    assert!(!account.is_corporate());
}

#[tokio::test]
async fn repeat_callback_resolves_to_the_same_account() {
    let app = TestApp::spawn().await;
    let info = provider_identity("g-1", "jane@example.com", Some("Jane Doe"));

    let first = app.state.sso.resolve_account("google", &info).await.unwrap();
    let second = app.state.sso.resolve_account("google", &info).await.unwrap();

    assert_eq!(first.account_id, second.account_id);
}

#[tokio::test]
async fn matching_email_links_instead_of_duplicating() {
    let app = TestApp::spawn().await;
    let registered = app
        .register("jane@example.com", "jane", "janepw-longenough")
        .await;

    let info = provider_identity("g-77", "jane@example.com", Some("Jane"));
    let resolved = app.state.sso.resolve_account("google", &info).await.unwrap();

    assert_eq!(resolved.account_id, registered.user.id);
    assert_eq!(resolved.sso_provider.as_deref(), Some("google"));
    assert_eq!(resolved.sso_subject.as_deref(), Some("g-77"));

    // She can still password-login after linking.
    assert!(app
        .state
        .login
        .login("jane@example.com", "janepw-longenough")
        .await
        .is_ok());
}

#[tokio::test]
async fn same_email_different_subjects_never_creates_two_accounts() {
    let app = TestApp::spawn().await;

    let first = provider_identity("sub-a", "jane@example.com", Some("Jane"));
    let second = provider_identity("sub-b", "jane@example.com", Some("Jane"));

    let a = app.state.sso.resolve_account("google", &first).await.unwrap();
    let b = app.state.sso.resolve_account("google", &second).await.unwrap();

    assert_eq!(a.account_id, b.account_id);
    // The linkage follows the most recent callback.
    assert_eq!(b.sso_subject.as_deref(), Some("sub-b"));
}

#[tokio::test]
async fn username_collisions_get_numeric_suffixes() {
    let app = TestApp::spawn().await;
    app.register("taken@example.com", "jane", "password-longenough")
        .await;

    let one = app
        .state
        .sso
        .resolve_account("google", &provider_identity("s1", "a@example.com", Some("Jane")))
        .await
        .unwrap();
    assert_eq!(one.username, "jane1");

    let two = app
        .state
        .sso
        .resolve_account("google", &provider_identity("s2", "b@example.com", Some("Jane")))
        .await
        .unwrap();
    assert_eq!(two.username, "jane2");
}

#[tokio::test]
async fn username_falls_back_to_email_local_part() {
    let app = TestApp::spawn().await;

    let info = provider_identity("s9", "Dev.Person@example.com", None);
    let account = app.state.sso.resolve_account("github", &info).await.unwrap();
    assert_eq!(account.username, "dev.person");
}

#[tokio::test]
async fn unsupported_provider_is_rejected_before_any_exchange() {
    let app = TestApp::spawn().await;

    let result = app.state.sso.authorize_url("gitlab");
    assert!(matches!(
        result,
        Err(ServiceError::UnsupportedProvider(name)) if name == "gitlab"
    ));
}

#[tokio::test]
async fn authorize_url_carries_client_and_callback() {
    let app = TestApp::spawn().await;

    let url = app.state.sso.authorize_url("google").expect("url");
    assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(url.contains("client_id=test-google-client"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains(&urlencoding::encode("http://localhost:8080/sso/google/callback").into_owned()));

    // Case-insensitive provider names, per the registry contract.
    assert!(app.state.sso.authorize_url("GoOgLe").is_ok());
}

#[tokio::test]
async fn resolved_account_with_mfa_gets_a_challenge_not_tokens() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("jane@example.com", "jane", "janepw-longenough")
        .await;

    // Enroll MFA on the local account.
    let setup = app.state.login.enroll_mfa_start(auth.user.id).await.unwrap();
    app.state
        .login
        .enroll_mfa_verify(auth.user.id, &current_totp_code(&setup.secret))
        .await
        .unwrap();

    // SSO resolution hands off to the same post-credential gate as login.
    let account = app
        .state
        .sso
        .resolve_account("google", &provider_identity("g-5", "jane@example.com", None))
        .await
        .unwrap();
    let outcome = app.state.login.post_credential(&account).await.unwrap();

    let LoginOutcome::SecondFactorRequired { two_factor_token } = outcome else {
        panic!("MFA-enrolled account must get a challenge from SSO too");
    };
    assert!(app
        .state
        .login
        .complete_second_factor(&two_factor_token, &current_totp_code(&setup.secret))
        .await
        .is_ok());
}

#[tokio::test]
async fn sso_account_count_stays_at_one_after_linking() {
    let app = TestApp::spawn().await;
    app.register("jane@example.com", "jane", "janepw-longenough")
        .await;

    app.state
        .sso
        .resolve_account("github", &provider_identity("77", "jane@example.com", None))
        .await
        .unwrap();

    // Linking mutated the existing row rather than inserting a new one.
    assert!(app
        .store
        .account_by_username("jane1")
        .await
        .unwrap()
        .is_none());
    assert!(app
        .store
        .account_by_sso("github", "77")
        .await
        .unwrap()
        .is_some());
}
