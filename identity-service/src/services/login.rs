//! Login orchestrator.
//!
//! Drives the login state machine: credentials in, then either a token pair
//! or a short-lived challenge that must be completed with a TOTP code.
//! Also owns MFA enrollment, refresh rotation, logout and password change.

use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::auth::{AuthResponse, RegisterRequest};
use crate::models::{Account, AuditEvent};
use crate::services::audit::AuditSink;
use crate::services::email::EmailProvider;
use crate::services::error::ServiceError;
use crate::services::session::SessionLedger;
use crate::services::token::TokenIssuer;
use crate::services::totp::{TotpEngine, TotpSetup};
use crate::storage::{IdentityStore, RedeemOutcome};
use crate::utils::password::{hash_password, verify_password, Password};

/// Result of the credential step.
///
/// Two variants force callers to branch: tokens for accounts without MFA,
/// a challenge token for enrolled accounts.
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(AuthResponse),
    SecondFactorRequired { two_factor_token: String },
}

#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn IdentityStore>,
    tokens: Arc<TokenIssuer>,
    totp: Arc<TotpEngine>,
    sessions: SessionLedger,
    audit: Arc<dyn AuditSink>,
    email: Arc<dyn EmailProvider>,
}

impl LoginService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        tokens: Arc<TokenIssuer>,
        totp: Arc<TotpEngine>,
        sessions: SessionLedger,
        audit: Arc<dyn AuditSink>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            store,
            tokens,
            totp,
            sessions,
            audit,
            email,
        }
    }

    /// Register a new individual account and authenticate it immediately.
    /// Corporate accounts are created via invitations instead.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        if self.store.account_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".into()));
        }
        if self
            .store
            .account_by_username(&req.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict("Username already taken".into()));
        }

        let password_hash = hash_blocking(req.password).await?;

        let mut account = Account::new(req.email, req.username, Some(password_hash));
        account.first_name = req.first_name;
        account.last_name = req.last_name;

        self.store.insert_account(&account).await?;
        tracing::info!(account_id = %account.account_id, "Account registered");

        self.dispatch_audit(AuditEvent::new(
            account.account_id,
            "account.register",
            "Account",
            Some(account.account_id),
        ));
        self.dispatch_welcome_email(&account);

        self.authenticate(&account).await
    }

    /// First step of a login.
    ///
    /// An unknown email, a wrong password and a deactivated account all
    /// produce the same `InvalidCredentials` so callers learn nothing about
    /// which one it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let Some(account) = self.store.account_by_email(email).await? else {
            return Err(ServiceError::InvalidCredentials);
        };

        let password = Password::new(password.to_string());
        let stored = account.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&password, stored.as_deref()))
                .await
                .map_err(|e| ServiceError::Internal(e.into()))?;

        if !verified || !account.is_active {
            return Err(ServiceError::InvalidCredentials);
        }

        self.post_credential(&account).await
    }

    /// Shared post-credential step for password and SSO logins: enrolled MFA
    /// means a challenge token, otherwise a full token pair.
    pub async fn post_credential(&self, account: &Account) -> Result<LoginOutcome, ServiceError> {
        if account.mfa_enrolled() {
            let two_factor_token = self.tokens.issue_challenge_token(account.account_id)?;
            return Ok(LoginOutcome::SecondFactorRequired { two_factor_token });
        }

        let auth = self.authenticate(account).await?;
        Ok(LoginOutcome::Authenticated(auth))
    }

    /// Second step of an MFA login: challenge token plus a current TOTP code.
    pub async fn complete_second_factor(
        &self,
        challenge_token: &str,
        code: &str,
    ) -> Result<AuthResponse, ServiceError> {
        let claims = self.tokens.validate_challenge(challenge_token)?;
        let account_id =
            Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidChallenge)?;

        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(ServiceError::InvalidChallenge)?;

        // An enrolled flag without a stored secret (invited corporate
        // accounts start this way) can never produce a valid code.
        let Some(secret) = account.totp_secret.clone() else {
            return Err(ServiceError::InvalidCode);
        };
        if !self.totp.validate_code(&secret, code) {
            return Err(ServiceError::InvalidCode);
        }

        self.authenticate(&account).await
    }

    /// Exchange a refresh token for a fresh pair. The old token is revoked
    /// in the same store operation that reads it; replaying it afterwards
    /// yields `InvalidSession` like every other dead token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ServiceError> {
        let session = match self.sessions.redeem(refresh_token).await? {
            RedeemOutcome::Redeemed(session) => session,
            // Absent, expired and revoked all look the same to the caller.
            RedeemOutcome::NotFound | RedeemOutcome::Expired | RedeemOutcome::Revoked => {
                return Err(ServiceError::InvalidSession)
            }
        };

        let account = self
            .store
            .account_by_id(session.account_id)
            .await?
            .ok_or(ServiceError::InvalidSession)?;

        if !account.is_active {
            return Err(ServiceError::InvalidSession);
        }

        tracing::info!(account_id = %account.account_id, "Session rotated");
        self.authenticate(&account).await
    }

    /// Revoke the session. Idempotent: an unknown or already-dead token
    /// still results in a successful logout.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ServiceError> {
        if let Some(session) = self.sessions.find(refresh_token).await? {
            self.dispatch_audit(AuditEvent::new(
                session.account_id,
                "account.logout",
                "Session",
                Some(session.session_id),
            ));
        }
        self.sessions.revoke(refresh_token).await
    }

    /// Begin MFA enrollment: generate a secret and hand back the
    /// provisioning material. The secret stays inactive until the first
    /// code is verified.
    pub async fn enroll_mfa_start(&self, account_id: Uuid) -> Result<TotpSetup, ServiceError> {
        let account = self.require_account(account_id).await?;

        if account.mfa_setup_complete {
            return Err(ServiceError::AlreadyEnrolled);
        }

        let setup = self.totp.generate_setup(&account.email)?;
        self.store
            .update_mfa_state(account_id, Some(&setup.secret), false, false)
            .await?;

        self.dispatch_audit(AuditEvent::new(
            account_id,
            "account.mfa_enroll_started",
            "Account",
            Some(account_id),
        ));

        Ok(setup)
    }

    /// Finish MFA enrollment by verifying the first code from the
    /// authenticator app. Returns a fresh token pair.
    pub async fn enroll_mfa_verify(
        &self,
        account_id: Uuid,
        code: &str,
    ) -> Result<AuthResponse, ServiceError> {
        let mut account = self.require_account(account_id).await?;

        let Some(secret) = account.totp_secret.clone() else {
            return Err(ServiceError::SetupNotStarted);
        };
        if !self.totp.validate_code(&secret, code) {
            return Err(ServiceError::InvalidCode);
        }

        self.store
            .update_mfa_state(account_id, Some(&secret), true, true)
            .await?;
        account.mfa_enabled = true;
        account.mfa_setup_complete = true;

        tracing::info!(account_id = %account_id, "MFA enabled");
        self.dispatch_audit(AuditEvent::new(
            account_id,
            "account.mfa_enabled",
            "Account",
            Some(account_id),
        ));

        self.authenticate(&account).await
    }

    /// Disable MFA entirely. Corporate accounts can never do this.
    pub async fn disable_mfa(&self, account_id: Uuid) -> Result<(), ServiceError> {
        let account = self.require_account(account_id).await?;

        if account.is_corporate() {
            return Err(ServiceError::MfaMandatory);
        }

        self.store
            .update_mfa_state(account_id, None, false, false)
            .await?;

        self.dispatch_audit(AuditEvent::new(
            account_id,
            "account.mfa_disabled",
            "Account",
            Some(account_id),
        ));

        Ok(())
    }

    /// Change the password, re-verifying the current one first. Every live
    /// session is revoked afterwards.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let account = self.require_account(account_id).await?;

        let current = Password::new(current_password.to_string());
        let stored = account.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&current, stored.as_deref()))
                .await
                .map_err(|e| ServiceError::Internal(e.into()))?;
        if !verified {
            return Err(ServiceError::InvalidCredentials);
        }

        let new_hash = hash_blocking(new_password.to_string()).await?;
        self.store
            .update_password_hash(account_id, &new_hash)
            .await?;
        self.sessions.revoke_all(account_id).await?;

        tracing::info!(account_id = %account_id, "Password changed");
        self.dispatch_audit(AuditEvent::new(
            account_id,
            "account.password_changed",
            "Account",
            Some(account_id),
        ));

        Ok(())
    }

    pub async fn current_account(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        self.require_account(account_id).await
    }

    /// Issue the token pair for a fully-authenticated account.
    pub(crate) async fn authenticate(
        &self,
        account: &Account,
    ) -> Result<AuthResponse, ServiceError> {
        let roles = self.store.role_names_for_account(account.account_id).await?;
        let (access_token, expires_at) = self.tokens.issue_access_token(account, &roles)?;

        let refresh_token = self.tokens.issue_refresh_token();
        self.sessions.open(account.account_id, &refresh_token).await?;

        self.dispatch_audit(AuditEvent::new(
            account.account_id,
            "account.login",
            "Account",
            Some(account.account_id),
        ));

        Ok(AuthResponse {
            access_token,
            refresh_token,
            expires_at,
            user: account.sanitized(),
        })
    }

    async fn require_account(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        self.store
            .account_by_id(account_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".into()))
    }

    /// Audit is fire-and-forget: spawned so it cannot block or fail the
    /// operation that produced the event.
    pub(crate) fn dispatch_audit(&self, event: AuditEvent) {
        let sink = self.audit.clone();
        tokio::spawn(async move {
            sink.record(event).await;
        });
    }

    fn dispatch_welcome_email(&self, account: &Account) {
        let email = self.email.clone();
        let to = account.email.clone();
        let username = account.username.clone();
        tokio::spawn(async move {
            if let Err(e) = email.send_welcome(&to, &username).await {
                tracing::warn!(error = %e, "welcome email failed");
            }
        });
    }
}

async fn hash_blocking(password: String) -> Result<String, ServiceError> {
    let password = Password::new(password);
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(e.into()))??;
    Ok(hash.into_string())
}
