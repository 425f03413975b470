//! Account model - local identity records across password, MFA and SSO login paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account class codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Individual,
    Corporate,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Individual => "individual",
            AccountType::Corporate => "corporate",
        }
    }
}

/// Account entity.
///
/// `password_hash` is null for accounts created through SSO that never set a
/// password; such accounts cannot be password-authenticated.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub account_type_code: String,
    pub is_active: bool,
    pub organization_id: Option<Uuid>,
    pub totp_secret: Option<String>,
    pub mfa_enabled: bool,
    pub mfa_setup_complete: bool,
    pub sso_provider: Option<String>,
    pub sso_subject: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Account {
    /// Create a new active individual account.
    pub fn new(email: String, username: String, password_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            account_id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            account_type_code: AccountType::Individual.as_str().to_string(),
            is_active: true,
            organization_id: None,
            totp_secret: None,
            mfa_enabled: false,
            mfa_setup_complete: false,
            sso_provider: None,
            sso_subject: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_corporate(&self) -> bool {
        self.account_type_code == AccountType::Corporate.as_str()
    }

    /// MFA enrollment is only finished once the first code has been verified.
    pub fn mfa_enrolled(&self) -> bool {
        self.mfa_enabled && self.mfa_setup_complete
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> AccountResponse {
        AccountResponse {
            id: self.account_id,
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar_url: self.avatar_url.clone(),
            account_type: self.account_type_code.clone(),
            organization_id: self.organization_id,
            mfa_enabled: self.mfa_enabled,
            created_utc: self.created_utc,
        }
    }
}

/// Account response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: String,
    pub organization_id: Option<Uuid>,
    pub mfa_enabled: bool,
    pub created_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_active_individual() {
        let account = Account::new(
            "a@example.com".to_string(),
            "a".to_string(),
            Some("hash".to_string()),
        );
        assert!(account.is_active);
        assert!(!account.is_corporate());
        assert!(!account.mfa_enrolled());
    }

    #[test]
    fn mfa_enrollment_requires_both_flags() {
        let mut account = Account::new("a@example.com".to_string(), "a".to_string(), None);
        account.mfa_enabled = true;
        assert!(!account.mfa_enrolled());
        account.mfa_setup_complete = true;
        assert!(account.mfa_enrolled());
    }
}
