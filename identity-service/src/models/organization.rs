//! Organization model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Organization entity.
#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub organization_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization.
    pub fn new(name: String, domain: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            organization_id: Uuid::new_v4(),
            name,
            domain,
            created_utc: now,
            updated_utc: now,
        }
    }
}

/// Request to create an organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub domain: Option<String>,
}

/// Organization response for API.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(o: Organization) -> Self {
        Self {
            id: o.organization_id,
            name: o.name,
            domain: o.domain,
            created_utc: o.created_utc,
        }
    }
}

/// Organization member with their role names in that organization.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub joined_utc: DateTime<Utc>,
}
