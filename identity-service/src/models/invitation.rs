//! Invitation model - organization invitations with a pre-assigned role.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Invitation state codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationState {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationState::Pending => "pending",
            InvitationState::Accepted => "accepted",
            InvitationState::Expired => "expired",
            InvitationState::Revoked => "revoked",
        }
    }
}

/// Invitation entity. Only the digest of the emailed token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub email: String,
    pub organization_id: Uuid,
    pub role_id: Uuid,
    pub invited_by_account_id: Uuid,
    pub token_hash: String,
    pub state_code: String,
    pub expiry_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Invitation {
    /// Create a pending invitation valid for seven days.
    pub fn new(
        email: String,
        organization_id: Uuid,
        role_id: Uuid,
        invited_by_account_id: Uuid,
        token_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            invitation_id: Uuid::new_v4(),
            email,
            organization_id,
            role_id,
            invited_by_account_id,
            token_hash,
            state_code: InvitationState::Pending.as_str().to_string(),
            expiry_utc: now + Duration::days(7),
            accepted_utc: None,
            created_utc: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state_code == InvitationState::Pending.as_str()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_utc
    }
}

/// Request to invite a member into an organization.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvitationRequest {
    #[validate(email)]
    pub email: String,
    pub role_id: Uuid,
}

/// Request to accept an invitation and create the corporate account.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Invitation response for API. The raw token travels only by email.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: Uuid,
    pub email: String,
    pub organization_id: Uuid,
    pub role_id: Uuid,
    pub state: String,
    pub expiry_utc: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        Self {
            id: i.invitation_id,
            email: i.email,
            organization_id: i.organization_id,
            role_id: i.role_id,
            state: i.state_code,
            expiry_utc: i.expiry_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_invitation_is_pending_for_seven_days() {
        let invitation = Invitation::new(
            "bob@acme.com".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest".to_string(),
        );
        assert!(invitation.is_pending());
        assert!(!invitation.is_expired());
        assert!(invitation.expiry_utc > Utc::now() + Duration::days(6));
    }

    #[test]
    fn stale_invitation_is_expired() {
        let mut invitation = Invitation::new(
            "bob@acme.com".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest".to_string(),
        );
        invitation.expiry_utc = Utc::now() - Duration::hours(1);
        assert!(invitation.is_expired());
    }
}
