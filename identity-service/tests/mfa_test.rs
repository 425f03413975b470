//! MFA enrollment and the two-step login protocol.

mod common;

use common::{current_totp_code, stale_totp_code, TestApp};
use identity_service::services::{LoginOutcome, ServiceError};

#[tokio::test]
async fn full_enrollment_flow_then_two_step_login() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;
    let alice = auth.user.id;

    // Step 1: setup returns a secret; MFA is not yet active.
    let setup = app
        .state
        .login
        .enroll_mfa_start(alice)
        .await
        .expect("setup");
    assert!(setup.provisioning_uri.starts_with("otpauth://totp/"));

    let outcome = app
        .state
        .login
        .login("alice@example.com", "alicepw-longenough")
        .await
        .expect("login during pending setup");
    assert!(
        matches!(outcome, LoginOutcome::Authenticated(_)),
        "pending setup must not gate login yet"
    );

    // Step 2: verify the first code; MFA becomes active and a fresh pair
    // is returned.
    let verified = app
        .state
        .login
        .enroll_mfa_verify(alice, &current_totp_code(&setup.secret))
        .await
        .expect("verify setup");
    assert!(verified.user.mfa_enabled);

    // Login now returns a challenge instead of tokens.
    let outcome = app
        .state
        .login
        .login("alice@example.com", "alicepw-longenough")
        .await
        .expect("login");
    let LoginOutcome::SecondFactorRequired { two_factor_token } = outcome else {
        panic!("enrolled account must never get tokens from the credential step");
    };

    // Wrong code fails, correct current-window code succeeds.
    let wrong = app
        .state
        .login
        .complete_second_factor(&two_factor_token, &stale_totp_code(&setup.secret))
        .await;
    assert!(matches!(wrong, Err(ServiceError::InvalidCode)));

    let completed = app
        .state
        .login
        .complete_second_factor(&two_factor_token, &current_totp_code(&setup.secret))
        .await
        .expect("second factor");
    assert!(!completed.access_token.is_empty());
    assert!(!completed.refresh_token.is_empty());
}

#[tokio::test]
async fn verify_without_setup_fails() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    let result = app
        .state
        .login
        .enroll_mfa_verify(auth.user.id, "123456")
        .await;
    assert!(matches!(result, Err(ServiceError::SetupNotStarted)));
}

#[tokio::test]
async fn setup_after_completed_enrollment_fails() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;
    let alice = auth.user.id;

    let setup = app.state.login.enroll_mfa_start(alice).await.unwrap();
    app.state
        .login
        .enroll_mfa_verify(alice, &current_totp_code(&setup.secret))
        .await
        .unwrap();

    let again = app.state.login.enroll_mfa_start(alice).await;
    assert!(matches!(again, Err(ServiceError::AlreadyEnrolled)));
}

#[tokio::test]
async fn wrong_code_during_verify_leaves_mfa_off() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;
    let alice = auth.user.id;

    let setup = app.state.login.enroll_mfa_start(alice).await.unwrap();
    let result = app
        .state
        .login
        .enroll_mfa_verify(alice, &stale_totp_code(&setup.secret))
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidCode)));

    let account = app.state.login.current_account(alice).await.unwrap();
    assert!(!account.mfa_enabled);
    assert!(!account.mfa_setup_complete);
}

#[tokio::test]
async fn individual_account_can_disable_mfa() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;
    let alice = auth.user.id;

    let setup = app.state.login.enroll_mfa_start(alice).await.unwrap();
    app.state
        .login
        .enroll_mfa_verify(alice, &current_totp_code(&setup.secret))
        .await
        .unwrap();

    app.state.login.disable_mfa(alice).await.expect("disable");

    let account = app.state.login.current_account(alice).await.unwrap();
    assert!(!account.mfa_enabled);
    assert!(account.totp_secret.is_none());

    // Login goes straight to tokens again.
    let outcome = app
        .state
        .login
        .login("alice@example.com", "alicepw-longenough")
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

#[tokio::test]
async fn challenge_token_must_be_a_real_challenge() {
    let app = TestApp::spawn().await;
    let auth = app
        .register("alice@example.com", "alice", "alicepw-longenough")
        .await;

    // Garbage is rejected outright.
    let garbage = app
        .state
        .login
        .complete_second_factor("not-a-token", "123456")
        .await;
    assert!(matches!(garbage, Err(ServiceError::InvalidChallenge)));

    // An access token has the right signature but the wrong shape/purpose.
    let smuggled = app
        .state
        .login
        .complete_second_factor(&auth.access_token, "123456")
        .await;
    assert!(matches!(smuggled, Err(ServiceError::InvalidChallenge)));
}
