//! RBAC resolver: effective roles per (account, organization) pair.
//!
//! Role names are case-sensitive strings, not a closed enum. The two
//! system roles are seeded at startup and immutable; organizations may
//! define additional roles scoped to themselves.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::error::ServiceError;
use crate::storage::IdentityStore;

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_EMPLOYEE: &str = "Employee";

#[derive(Clone)]
pub struct RbacResolver {
    store: Arc<dyn IdentityStore>,
}

impl RbacResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Union of all role assignments for the pair.
    pub async fn effective_roles(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<HashSet<String>, ServiceError> {
        let names = self
            .store
            .role_names_for_account_in_org(account_id, organization_id)
            .await?;
        Ok(names.into_iter().collect())
    }

    /// The authorization gate for every organization-admin operation.
    pub async fn is_admin(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let roles = self.effective_roles(account_id, organization_id).await?;
        Ok(roles.contains(ROLE_ADMIN))
    }

    pub async fn ensure_admin(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), ServiceError> {
        if self.is_admin(account_id, organization_id).await? {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Admin privileges required".into()))
        }
    }
}
