//! Storage seam for the engine.
//!
//! Every service talks to the relational store through [`IdentityStore`], so
//! the production Postgres backend and the in-memory backend used by tests
//! and single-process demos are interchangeable.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Account, Invitation, Organization, PasswordResetToken, Role, RoleAssignment, Session,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

/// Outcome of a session redemption attempt.
///
/// `Redeemed` means this caller won the atomic revoke: the row is now marked
/// revoked and no concurrent caller can redeem the same token.
#[derive(Debug)]
pub enum RedeemOutcome {
    Redeemed(Session),
    NotFound,
    Expired,
    Revoked,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // ==================== Accounts ====================

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;
    async fn account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, StoreError>;
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;
    async fn account_by_sso(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Account>, StoreError>;
    async fn update_password_hash(
        &self,
        account_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError>;
    async fn update_mfa_state(
        &self,
        account_id: Uuid,
        totp_secret: Option<&str>,
        mfa_enabled: bool,
        mfa_setup_complete: bool,
    ) -> Result<(), StoreError>;
    async fn link_sso_identity(
        &self,
        account_id: Uuid,
        provider: &str,
        subject: &str,
    ) -> Result<(), StoreError>;
    async fn set_account_organization(
        &self,
        account_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<(), StoreError>;
    async fn set_account_active(&self, account_id: Uuid, is_active: bool)
        -> Result<(), StoreError>;

    // ==================== Sessions ====================

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn session_by_hash(&self, token_hash: &str) -> Result<Option<Session>, StoreError>;

    /// Atomically revoke-and-return a live session.
    ///
    /// Must be a single conditional update, not a read-then-write pair: two
    /// concurrent calls with the same token yield exactly one `Redeemed`.
    async fn redeem_session(&self, token_hash: &str) -> Result<RedeemOutcome, StoreError>;

    /// Idempotent revocation; unknown tokens are a no-op.
    async fn revoke_session(&self, token_hash: &str) -> Result<(), StoreError>;
    async fn revoke_sessions_for_account(&self, account_id: Uuid) -> Result<u64, StoreError>;

    // ==================== Organizations ====================

    async fn insert_organization(&self, organization: &Organization) -> Result<(), StoreError>;
    async fn organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, StoreError>;
    async fn members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Account>, StoreError>;

    // ==================== Roles ====================

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError>;
    async fn role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, StoreError>;
    async fn system_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Create a system role if it does not exist yet; returns the live row.
    async fn ensure_system_role(&self, name: &str, description: &str)
        -> Result<Role, StoreError>;

    /// System roles plus the organization's own roles.
    async fn roles_in_organization(&self, organization_id: Uuid) -> Result<Vec<Role>, StoreError>;

    /// Idempotent: an existing (account, role, organization) row is kept.
    async fn insert_role_assignment(&self, assignment: &RoleAssignment)
        -> Result<(), StoreError>;
    async fn delete_role_assignment(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, StoreError>;
    async fn delete_assignments_for_member(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Distinct role names across all of the account's assignments.
    async fn role_names_for_account(&self, account_id: Uuid) -> Result<Vec<String>, StoreError>;
    async fn role_names_for_account_in_org(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<String>, StoreError>;

    // ==================== Invitations ====================

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError>;
    async fn invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError>;
    async fn mark_invitation_accepted(&self, invitation_id: Uuid) -> Result<(), StoreError>;

    // ==================== Password reset ====================

    /// Insert a reset token, replacing any live token for the same account.
    async fn replace_reset_token(&self, token: &PasswordResetToken) -> Result<(), StoreError>;

    /// Atomically consume a token; returns the owning account when the token
    /// was live. Expired tokens are removed and yield `None`.
    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<Uuid>, StoreError>;
    async fn purge_expired_reset_tokens(&self) -> Result<u64, StoreError>;
}
