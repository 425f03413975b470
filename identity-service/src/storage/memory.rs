//! In-memory backend.
//!
//! Same contract as [`PgStore`](super::PgStore) behind a single process-wide
//! lock; the one lock is what makes `redeem_session` a true check-and-set.
//! Used by the test suites and by single-process demos without Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::{
    Account, Invitation, InvitationState, Organization, PasswordResetToken, Role, RoleAssignment,
    Session,
};

use super::{IdentityStore, RedeemOutcome, StoreError};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    sessions: HashMap<String, Session>,
    organizations: HashMap<Uuid, Organization>,
    roles: HashMap<Uuid, Role>,
    assignments: Vec<RoleAssignment>,
    invitations: HashMap<Uuid, Invitation>,
    reset_tokens: HashMap<String, PasswordResetToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    // ==================== Accounts ====================

    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.accounts.get(&account_id).cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn account_by_sso(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| {
                a.sso_provider.as_deref() == Some(provider)
                    && a.sso_subject.as_deref() == Some(subject)
            })
            .cloned())
    }

    async fn update_password_hash(
        &self,
        account_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.password_hash = Some(password_hash.to_string());
            account.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn update_mfa_state(
        &self,
        account_id: Uuid,
        totp_secret: Option<&str>,
        mfa_enabled: bool,
        mfa_setup_complete: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.totp_secret = totp_secret.map(str::to_string);
            account.mfa_enabled = mfa_enabled;
            account.mfa_setup_complete = mfa_setup_complete;
            account.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn link_sso_identity(
        &self,
        account_id: Uuid,
        provider: &str,
        subject: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.sso_provider = Some(provider.to_string());
            account.sso_subject = Some(subject.to_string());
            account.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn set_account_organization(
        &self,
        account_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.organization_id = organization_id;
            account.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn set_account_active(
        &self,
        account_id: Uuid,
        is_active: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(account) = inner.accounts.get_mut(&account_id) {
            account.is_active = is_active;
            account.updated_utc = Utc::now();
        }
        Ok(())
    }

    // ==================== Sessions ====================

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn session_by_hash(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.read()?.sessions.get(token_hash).cloned())
    }

    async fn redeem_session(&self, token_hash: &str) -> Result<RedeemOutcome, StoreError> {
        // Check-and-set under the write lock; the second concurrent caller
        // observes the revocation the first one just wrote.
        let mut inner = self.write()?;
        let Some(session) = inner.sessions.get_mut(token_hash) else {
            return Ok(RedeemOutcome::NotFound);
        };

        if session.is_revoked() {
            return Ok(RedeemOutcome::Revoked);
        }
        if session.is_expired() {
            return Ok(RedeemOutcome::Expired);
        }

        session.revoked_utc = Some(Utc::now());
        Ok(RedeemOutcome::Redeemed(session.clone()))
    }

    async fn revoke_session(&self, token_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(session) = inner.sessions.get_mut(token_hash) {
            if session.revoked_utc.is_none() {
                session.revoked_utc = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_sessions_for_account(&self, account_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let mut revoked = 0;
        for session in inner.sessions.values_mut() {
            if session.account_id == account_id && session.revoked_utc.is_none() {
                session.revoked_utc = Some(Utc::now());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    // ==================== Organizations ====================

    async fn insert_organization(&self, organization: &Organization) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner
            .organizations
            .insert(organization.organization_id, organization.clone());
        Ok(())
    }

    async fn organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, StoreError> {
        Ok(self.read()?.organizations.get(&organization_id).cloned())
    }

    async fn members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Account>, StoreError> {
        let mut members: Vec<Account> = self
            .read()?
            .accounts
            .values()
            .filter(|a| a.organization_id == Some(organization_id))
            .cloned()
            .collect();
        members.sort_by_key(|a| a.created_utc);
        Ok(members)
    }

    // ==================== Roles ====================

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.roles.insert(role.role_id, role.clone());
        Ok(())
    }

    async fn role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.get(&role_id).cloned())
    }

    async fn system_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self
            .read()?
            .roles
            .values()
            .find(|r| r.is_system_role && r.name == name)
            .cloned())
    }

    async fn ensure_system_role(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Role, StoreError> {
        let mut inner = self.write()?;
        if let Some(existing) = inner
            .roles
            .values()
            .find(|r| r.is_system_role && r.name == name)
        {
            return Ok(existing.clone());
        }
        let role = Role::system(name.to_string(), Some(description.to_string()));
        inner.roles.insert(role.role_id, role.clone());
        Ok(role)
    }

    async fn roles_in_organization(&self, organization_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let mut roles: Vec<Role> = self
            .read()?
            .roles
            .values()
            .filter(|r| r.is_system_role || r.organization_id == Some(organization_id))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn insert_role_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let exists = inner.assignments.iter().any(|a| {
            a.account_id == assignment.account_id
                && a.role_id == assignment.role_id
                && a.organization_id == assignment.organization_id
        });
        if !exists {
            inner.assignments.push(assignment.clone());
        }
        Ok(())
    }

    async fn delete_role_assignment(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        let before = inner.assignments.len();
        inner.assignments.retain(|a| {
            !(a.account_id == account_id
                && a.role_id == role_id
                && a.organization_id == organization_id)
        });
        Ok(inner.assignments.len() < before)
    }

    async fn delete_assignments_for_member(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner
            .assignments
            .retain(|a| !(a.account_id == account_id && a.organization_id == organization_id));
        Ok(())
    }

    async fn role_names_for_account(&self, account_id: Uuid) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let mut names: Vec<String> = inner
            .assignments
            .iter()
            .filter(|a| a.account_id == account_id)
            .filter_map(|a| inner.roles.get(&a.role_id))
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn role_names_for_account_in_org(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let mut names: Vec<String> = inner
            .assignments
            .iter()
            .filter(|a| a.account_id == account_id && a.organization_id == organization_id)
            .filter_map(|a| inner.roles.get(&a.role_id))
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    // ==================== Invitations ====================

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner
            .invitations
            .insert(invitation.invitation_id, invitation.clone());
        Ok(())
    }

    async fn invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        Ok(self
            .read()?
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn mark_invitation_accepted(&self, invitation_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if let Some(invitation) = inner.invitations.get_mut(&invitation_id) {
            invitation.state_code = InvitationState::Accepted.as_str().to_string();
            invitation.accepted_utc = Some(Utc::now());
        }
        Ok(())
    }

    // ==================== Password reset ====================

    async fn replace_reset_token(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner
            .reset_tokens
            .retain(|_, t| t.account_id != token.account_id);
        inner
            .reset_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<Uuid>, StoreError> {
        let mut inner = self.write()?;
        let Some(token) = inner.reset_tokens.remove(token_hash) else {
            return Ok(None);
        };
        if token.is_expired() {
            return Ok(None);
        }
        Ok(Some(token.account_id))
    }

    async fn purge_expired_reset_tokens(&self) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let before = inner.reset_tokens.len();
        inner.reset_tokens.retain(|_, t| !t.is_expired());
        Ok((before - inner.reset_tokens.len()) as u64)
    }
}
