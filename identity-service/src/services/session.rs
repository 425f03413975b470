//! Session ledger: refresh-token lifecycle over the store.
//!
//! Sessions rotate: redeeming a token revokes it in the same store
//! operation, so a replayed refresh token can never yield a second live
//! session. Rows are revoked, never deleted.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::Session;
use crate::services::error::ServiceError;
use crate::storage::{IdentityStore, RedeemOutcome};
use crate::utils::sha256_hex;

#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn IdentityStore>,
    refresh_token_expiry_days: i64,
}

impl SessionLedger {
    pub fn new(store: Arc<dyn IdentityStore>, refresh_token_expiry_days: i64) -> Self {
        Self {
            store,
            refresh_token_expiry_days,
        }
    }

    /// Persist a new session for the raw refresh token just issued.
    pub async fn open(&self, account_id: Uuid, raw_token: &str) -> Result<Session, ServiceError> {
        let session = Session::new(
            account_id,
            sha256_hex(raw_token),
            self.refresh_token_expiry_days,
        );
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    /// Atomically redeem a refresh token.
    ///
    /// On `Redeemed` the row is already revoked and the caller owns the
    /// rotation; every other outcome means the token buys nothing.
    pub async fn redeem(&self, raw_token: &str) -> Result<RedeemOutcome, ServiceError> {
        let outcome = self.store.redeem_session(&sha256_hex(raw_token)).await?;
        Ok(outcome)
    }

    /// Idempotent revocation for logout. A missing or already-revoked token
    /// is a no-op, not an error.
    pub async fn revoke(&self, raw_token: &str) -> Result<(), ServiceError> {
        self.store.revoke_session(&sha256_hex(raw_token)).await?;
        Ok(())
    }

    /// Revoke every live session an account holds.
    pub async fn revoke_all(&self, account_id: Uuid) -> Result<u64, ServiceError> {
        let revoked = self.store.revoke_sessions_for_account(account_id).await?;
        Ok(revoked)
    }

    pub async fn find(&self, raw_token: &str) -> Result<Option<Session>, ServiceError> {
        let session = self.store.session_by_hash(&sha256_hex(raw_token)).await?;
        Ok(session)
    }
}
