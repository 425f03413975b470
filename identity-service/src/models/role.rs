//! Role and role-assignment models.
//!
//! Roles are either system-wide (`is_system_role`) or scoped to a single
//! organization. An assignment binds (account, role, organization); its
//! organization must match the role's organization unless the role is
//! system-wide.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role entity.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system_role: bool,
    pub organization_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new organization-scoped role.
    pub fn new(organization_id: Uuid, name: String, description: Option<String>) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            name,
            description,
            is_system_role: false,
            organization_id: Some(organization_id),
            created_utc: Utc::now(),
        }
    }

    /// Create a system-wide role.
    pub fn system(name: String, description: Option<String>) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            name,
            description,
            is_system_role: true,
            organization_id: None,
            created_utc: Utc::now(),
        }
    }
}

/// Role assignment entity.
#[derive(Debug, Clone, FromRow)]
pub struct RoleAssignment {
    pub account_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Uuid,
    pub assigned_utc: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(account_id: Uuid, role_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            account_id,
            role_id,
            organization_id,
            assigned_utc: Utc::now(),
        }
    }
}

/// Request to create an organization-scoped role.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Role response for API.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system_role: bool,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            id: r.role_id,
            name: r.name,
            description: r.description,
            is_system_role: r.is_system_role,
        }
    }
}
