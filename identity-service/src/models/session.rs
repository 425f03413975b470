//! Session model - persisted refresh-token records with rotation state.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity. Rows are revoked, never deleted.
///
/// Only the SHA-256 digest of the opaque refresh token is stored; the raw
/// token exists nowhere but in the client's hands.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Session {
    /// Create a new session for an account.
    pub fn new(account_id: Uuid, token_hash: String, expiry_days: i64) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            account_id,
            token_hash,
            expiry_utc: now + Duration::days(expiry_days),
            revoked_utc: None,
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }

    /// Check if the session can still be redeemed.
    pub fn is_live(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_live() {
        let session = Session::new(Uuid::new_v4(), "digest".to_string(), 7);
        assert!(!session.is_expired());
        assert!(!session.is_revoked());
        assert!(session.is_live());
    }

    #[test]
    fn expired_session_is_not_live() {
        let mut session = Session::new(Uuid::new_v4(), "digest".to_string(), 7);
        session.expiry_utc = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        assert!(!session.is_live());
    }

    #[test]
    fn revoked_session_is_not_live() {
        let mut session = Session::new(Uuid::new_v4(), "digest".to_string(), 7);
        session.revoked_utc = Some(Utc::now());
        assert!(session.is_revoked());
        assert!(!session.is_live());
    }
}
