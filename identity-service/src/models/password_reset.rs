//! Password-reset token model.
//!
//! Stored durably with a TTL column instead of in process memory, so the
//! flow survives restarts and scales past one instance. At most one live
//! token exists per account; issuing a new one replaces the old.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub account_id: Uuid,
    pub token_hash: String,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Create a token record valid for one hour.
    pub fn new(account_id: Uuid, token_hash: String) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            token_hash,
            expiry_utc: now + Duration::hours(1),
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }
}
