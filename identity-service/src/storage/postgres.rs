//! PostgreSQL backend.
//!
//! Hand-written runtime-checked queries over the normalized schema in
//! `./migrations`. Session redemption and reset-token consumption are single
//! conditional statements so they stay linearizable per token.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    Account, Invitation, InvitationState, Organization, PasswordResetToken, Role, RoleAssignment,
    Session,
};

use super::{IdentityStore, RedeemOutcome, StoreError};

/// PostgreSQL store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== Accounts ====================

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id, email, username, password_hash, account_type_code,
                is_active, organization_id, totp_secret, mfa_enabled, mfa_setup_complete,
                sso_provider, sso_subject, first_name, last_name, avatar_url,
                created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(&account.account_type_code)
        .bind(account.is_active)
        .bind(account.organization_id)
        .bind(&account.totp_secret)
        .bind(account.mfa_enabled)
        .bind(account.mfa_setup_complete)
        .bind(&account.sso_provider)
        .bind(&account.sso_subject)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.avatar_url)
        .bind(account.created_utc)
        .bind(account.updated_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        let account =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(account)
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(account)
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn account_by_sso(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE sso_provider = $1 AND sso_subject = $2",
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_password_hash(
        &self,
        account_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE accounts SET password_hash = $1, updated_utc = now() WHERE account_id = $2",
        )
        .bind(password_hash)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_mfa_state(
        &self,
        account_id: Uuid,
        totp_secret: Option<&str>,
        mfa_enabled: bool,
        mfa_setup_complete: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET totp_secret = $1, mfa_enabled = $2, mfa_setup_complete = $3, updated_utc = now()
            WHERE account_id = $4
            "#,
        )
        .bind(totp_secret)
        .bind(mfa_enabled)
        .bind(mfa_setup_complete)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_sso_identity(
        &self,
        account_id: Uuid,
        provider: &str,
        subject: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET sso_provider = $1, sso_subject = $2, updated_utc = now()
            WHERE account_id = $3
            "#,
        )
        .bind(provider)
        .bind(subject)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_account_organization(
        &self,
        account_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE accounts SET organization_id = $1, updated_utc = now() WHERE account_id = $2",
        )
        .bind(organization_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_account_active(
        &self,
        account_id: Uuid,
        is_active: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE accounts SET is_active = $1, updated_utc = now() WHERE account_id = $2",
        )
        .bind(is_active)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Sessions ====================

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, account_id, token_hash, expiry_utc, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.session_id)
        .bind(session.account_id)
        .bind(&session.token_hash)
        .bind(session.expiry_utc)
        .bind(session.revoked_utc)
        .bind(session.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn session_by_hash(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn redeem_session(&self, token_hash: &str) -> Result<RedeemOutcome, StoreError> {
        // The conditional update is the whole point: only one caller can move
        // a live row to revoked, everyone else falls through to the classify
        // query below.
        let redeemed = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET revoked_utc = now()
            WHERE token_hash = $1 AND revoked_utc IS NULL AND expiry_utc > now()
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(session) = redeemed {
            return Ok(RedeemOutcome::Redeemed(session));
        }

        match self.session_by_hash(token_hash).await? {
            None => Ok(RedeemOutcome::NotFound),
            Some(session) if session.is_revoked() => Ok(RedeemOutcome::Revoked),
            Some(_) => Ok(RedeemOutcome::Expired),
        }
    }

    async fn revoke_session(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sessions SET revoked_utc = now() WHERE token_hash = $1 AND revoked_utc IS NULL",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_sessions_for_account(&self, account_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_utc = now() WHERE account_id = $1 AND revoked_utc IS NULL",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== Organizations ====================

    async fn insert_organization(&self, organization: &Organization) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO organizations (organization_id, name, domain, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(organization.organization_id)
        .bind(&organization.name)
        .bind(&organization.domain)
        .bind(organization.created_utc)
        .bind(organization.updated_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, StoreError> {
        let organization = sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(organization)
    }

    async fn members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Account>, StoreError> {
        let members = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE organization_id = $1 ORDER BY created_utc",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    // ==================== Roles ====================

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO roles (role_id, name, description, is_system_role, organization_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(role.role_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.is_system_role)
        .bind(role.organization_id)
        .bind(role.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, StoreError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn system_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE name = $1 AND is_system_role = TRUE",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn ensure_system_role(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Role, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO roles (role_id, name, description, is_system_role, organization_id, created_utc)
            VALUES ($1, $2, $3, TRUE, NULL, $4)
            ON CONFLICT (name) WHERE is_system_role DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.system_role_by_name(name).await?.ok_or_else(|| {
            StoreError::Internal(format!("system role {name} missing after seeding"))
        })
    }

    async fn roles_in_organization(&self, organization_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE is_system_role = TRUE OR organization_id = $1 ORDER BY name",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn insert_role_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO role_assignments (account_id, role_id, organization_id, assigned_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id, role_id, organization_id) DO NOTHING
            "#,
        )
        .bind(assignment.account_id)
        .bind(assignment.role_id)
        .bind(assignment.organization_id)
        .bind(assignment.assigned_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_role_assignment(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_assignments
            WHERE account_id = $1 AND role_id = $2 AND organization_id = $3
            "#,
        )
        .bind(account_id)
        .bind(role_id)
        .bind(organization_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_assignments_for_member(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM role_assignments WHERE account_id = $1 AND organization_id = $2")
            .bind(account_id)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn role_names_for_account(&self, account_id: Uuid) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT r.name
            FROM role_assignments ra
            JOIN roles r ON r.role_id = ra.role_id
            WHERE ra.account_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn role_names_for_account_in_org(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT r.name
            FROM role_assignments ra
            JOIN roles r ON r.role_id = ra.role_id
            WHERE ra.account_id = $1 AND ra.organization_id = $2
            ORDER BY r.name
            "#,
        )
        .bind(account_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    // ==================== Invitations ====================

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO invitations (
                invitation_id, email, organization_id, role_id, invited_by_account_id,
                token_hash, state_code, expiry_utc, accepted_utc, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(&invitation.email)
        .bind(invitation.organization_id)
        .bind(invitation.role_id)
        .bind(invitation.invited_by_account_id)
        .bind(&invitation.token_hash)
        .bind(&invitation.state_code)
        .bind(invitation.expiry_utc)
        .bind(invitation.accepted_utc)
        .bind(invitation.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let invitation =
            sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(invitation)
    }

    async fn mark_invitation_accepted(&self, invitation_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE invitations
            SET state_code = $1, accepted_utc = now()
            WHERE invitation_id = $2
            "#,
        )
        .bind(InvitationState::Accepted.as_str())
        .bind(invitation_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Password reset ====================

    async fn replace_reset_token(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (account_id, token_hash, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expiry_utc = EXCLUDED.expiry_utc,
                created_utc = EXCLUDED.created_utc
            "#,
        )
        .bind(token.account_id)
        .bind(&token.token_hash)
        .bind(token.expiry_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<Uuid>, StoreError> {
        // Expired rows are consumed too, but report as absent.
        let row = sqlx::query_as::<_, PasswordResetToken>(
            "DELETE FROM password_reset_tokens WHERE token_hash = $1 RETURNING *",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.filter(|t| !t.is_expired()).map(|t| t.account_id))
    }

    async fn purge_expired_reset_tokens(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expiry_utc <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
