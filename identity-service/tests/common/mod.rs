//! Test helper module for the in-process integration suites.
//!
//! Builds the full service graph over the in-memory store with recording
//! mail/audit sinks, so the suites exercise the real orchestration logic
//! without Postgres or SMTP.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use identity_service::{
    config::{
        AuthConfig, DatabaseConfig, Environment, JwtConfig, SecurityConfig, SmtpConfig, SsoConfig,
        SsoProviderConfig, TotpConfig,
    },
    dtos::auth::{AuthResponse, RegisterRequest},
    services::{RecordingAuditSink, RecordingMailer, TotpEngine, ROLE_ADMIN, ROLE_EMPLOYEE},
    storage::{IdentityStore, MemoryStore},
    AppState,
};

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub audit: Arc<RecordingAuditSink>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let audit = Arc::new(RecordingAuditSink::new());

        let store_dyn: Arc<dyn IdentityStore> = store.clone();
        store_dyn
            .ensure_system_role(ROLE_ADMIN, "Organization administrator")
            .await
            .expect("seed Admin role");
        store_dyn
            .ensure_system_role(ROLE_EMPLOYEE, "Organization employee")
            .await
            .expect("seed Employee role");

        let state = AppState::build(test_config(), store_dyn, mailer.clone(), audit.clone())
            .expect("build app state");

        Self {
            state,
            store,
            mailer,
            audit,
        }
    }

    /// Register an individual account and return its token pair.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> AuthResponse {
        self.state
            .login
            .register(RegisterRequest {
                email: email.to_string(),
                username: username.to_string(),
                password: password.to_string(),
                first_name: None,
                last_name: None,
            })
            .await
            .expect("register account")
    }
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        base_url: "http://localhost:8080".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused-in-tests".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: "integration-test-signing-key-0123456789".to_string(),
            issuer: "identity-service".to_string(),
            audience: "identity-clients".to_string(),
            access_token_expiry_minutes: 60,
            challenge_token_expiry_minutes: 10,
            refresh_token_expiry_days: 7,
        },
        totp: TotpConfig {
            issuer: "identity-service-test".to_string(),
        },
        sso: SsoConfig {
            callback_base_url: "http://localhost:8080".to_string(),
            google: Some(SsoProviderConfig {
                client_id: "test-google-client".to_string(),
                client_secret: "test-google-secret".to_string(),
            }),
            github: Some(SsoProviderConfig {
                client_id: "test-github-client".to_string(),
                client_secret: "test-github-secret".to_string(),
            }),
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@localhost".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// The code a correctly-configured authenticator app would show right now.
pub fn current_totp_code(secret_base32: &str) -> String {
    TotpEngine::new("identity-service-test")
        .code_at(secret_base32, now_secs())
        .expect("valid secret")
}

/// A code from far outside the acceptance window.
pub fn stale_totp_code(secret_base32: &str) -> String {
    TotpEngine::new("identity-service-test")
        .code_at(secret_base32, now_secs() - 3600)
        .expect("valid secret")
}
