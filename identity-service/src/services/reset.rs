//! Password reset over durable, TTL-bounded tokens.
//!
//! The request path always reports success so callers cannot probe which
//! emails exist; internal failures are logged and swallowed. Tokens live in
//! the store with a one-hour expiry, at most one per account, and are
//! consumed atomically on use.

use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

use crate::models::{AuditEvent, PasswordResetToken};
use crate::services::audit::AuditSink;
use crate::services::email::EmailProvider;
use crate::services::error::ServiceError;
use crate::services::session::SessionLedger;
use crate::storage::IdentityStore;
use crate::utils::password::{hash_password, Password};
use crate::utils::sha256_hex;

#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn IdentityStore>,
    sessions: SessionLedger,
    email: Arc<dyn EmailProvider>,
    audit: Arc<dyn AuditSink>,
}

impl PasswordResetService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        sessions: SessionLedger,
        email: Arc<dyn EmailProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            sessions,
            email,
            audit,
        }
    }

    /// Issue a reset token if the email belongs to a resettable account.
    /// Infallible from the caller's perspective, whatever happens inside.
    pub async fn request(&self, email: &str) {
        if let Err(e) = self.try_issue(email).await {
            tracing::warn!(error = %e, "password reset request failed");
        }
    }

    async fn try_issue(&self, email: &str) -> Result<(), ServiceError> {
        let Some(account) = self.store.account_by_email(email).await? else {
            return Ok(());
        };

        // SSO-linked accounts authenticate at their provider; resetting a
        // password here would sidestep that.
        if account.sso_provider.is_some() {
            return Ok(());
        }

        // Opportunistic sweep; this flow touches the table anyway.
        let _ = self.store.purge_expired_reset_tokens().await;

        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let raw_token = hex::encode(bytes);

        let record = PasswordResetToken::new(account.account_id, sha256_hex(&raw_token));
        self.store.replace_reset_token(&record).await?;

        tracing::info!(account_id = %account.account_id, "Password reset requested");

        self.email
            .send_password_reset(&account.email, &raw_token)
            .await
            .map_err(ServiceError::Internal)?;

        Ok(())
    }

    /// Consume a reset token and set the new password. Every live session
    /// the account holds is revoked.
    pub async fn reset(&self, token: &str, new_password: &str) -> Result<(), ServiceError> {
        let account_id = self
            .store
            .consume_reset_token(&sha256_hex(token))
            .await?
            .ok_or(ServiceError::InvalidResetToken)?;

        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(ServiceError::InvalidResetToken)?;

        let password = Password::new(new_password.to_string());
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))??;

        self.store
            .update_password_hash(account.account_id, password_hash.as_str())
            .await?;
        self.sessions.revoke_all(account.account_id).await?;

        tracing::info!(account_id = %account.account_id, "Password reset completed");
        self.dispatch_audit(AuditEvent::new(
            account.account_id,
            "account.password_reset",
            "Account",
            Some(account.account_id),
        ));

        Ok(())
    }

    fn dispatch_audit(&self, event: AuditEvent) {
        let sink = self.audit.clone();
        tokio::spawn(async move {
            sink.record(event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tokens_are_hex_and_unique() {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let a = hex::encode(bytes);
        OsRng.fill_bytes(&mut bytes);
        let b = hex::encode(bytes);

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
