//! Organization service: org lifecycle, invitations, membership and roles.
//!
//! Every mutating operation here is admin-gated through the RBAC resolver
//! except `accept_invitation`, which is gated by the invitation token
//! itself. Accepting an invitation is the only way corporate accounts come
//! into existence; they are born with MFA flags set and finish enrollment
//! through the authenticated 2FA setup endpoints.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    invitation::AcceptInvitationRequest, Account, AccountType, AuditEvent, Invitation,
    Organization, Role, RoleAssignment,
};
use crate::services::audit::AuditSink;
use crate::services::email::EmailProvider;
use crate::services::error::ServiceError;
use crate::services::rbac::{RbacResolver, ROLE_ADMIN};
use crate::storage::IdentityStore;
use crate::utils::password::{hash_password, Password};
use crate::utils::sha256_hex;

#[derive(Clone)]
pub struct OrgService {
    store: Arc<dyn IdentityStore>,
    rbac: RbacResolver,
    audit: Arc<dyn AuditSink>,
    email: Arc<dyn EmailProvider>,
}

impl OrgService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        rbac: RbacResolver,
        audit: Arc<dyn AuditSink>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            store,
            rbac,
            audit,
            email,
        }
    }

    /// Create an organization; the creator joins it and becomes its Admin.
    pub async fn create(
        &self,
        creator_id: Uuid,
        name: String,
        domain: Option<String>,
    ) -> Result<Organization, ServiceError> {
        let admin_role = self
            .store
            .system_role_by_name(ROLE_ADMIN)
            .await?
            .ok_or_else(|| ServiceError::NotFound("System Admin role not found".into()))?;

        let creator = self
            .store
            .account_by_id(creator_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".into()))?;

        let organization = Organization::new(name, domain);
        self.store.insert_organization(&organization).await?;
        self.store
            .set_account_organization(creator.account_id, Some(organization.organization_id))
            .await?;
        self.store
            .insert_role_assignment(&RoleAssignment::new(
                creator.account_id,
                admin_role.role_id,
                organization.organization_id,
            ))
            .await?;

        tracing::info!(
            organization_id = %organization.organization_id,
            creator_id = %creator_id,
            "Organization created"
        );
        self.dispatch_audit(
            AuditEvent::new(
                creator_id,
                "organization.created",
                "Organization",
                Some(organization.organization_id),
            )
            .in_organization(organization.organization_id),
        );

        Ok(organization)
    }

    /// Invite a new member by email, pre-assigning the role they receive
    /// when they accept. Returns the invitation together with the raw token
    /// that traveled by email.
    pub async fn invite_member(
        &self,
        admin_id: Uuid,
        organization_id: Uuid,
        email: String,
        role_id: Uuid,
    ) -> Result<(Invitation, String), ServiceError> {
        self.rbac.ensure_admin(admin_id, organization_id).await?;

        let organization = self
            .store
            .organization_by_id(organization_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Organization not found".into()))?;

        if let Some(existing) = self.store.account_by_email(&email).await? {
            if existing.organization_id == Some(organization_id) {
                return Err(ServiceError::Conflict("User is already a member".into()));
            }
        }

        let role = self
            .store
            .role_by_id(role_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Role not found".into()))?;
        if !role.is_system_role && role.organization_id != Some(organization_id) {
            return Err(ServiceError::NotFound("Role not found".into()));
        }

        let raw_token = Uuid::new_v4().simple().to_string();
        let invitation = Invitation::new(
            email.clone(),
            organization_id,
            role_id,
            admin_id,
            sha256_hex(&raw_token),
        );
        self.store.insert_invitation(&invitation).await?;

        self.dispatch_audit(
            AuditEvent::new(
                admin_id,
                "organization.member_invited",
                "Invitation",
                Some(invitation.invitation_id),
            )
            .in_organization(organization_id),
        );

        // Mail trouble never fails the invitation itself.
        let inviter_name = self
            .store
            .account_by_id(admin_id)
            .await?
            .map(|a| a.username)
            .unwrap_or_else(|| "Admin".to_string());
        let mailer = self.email.clone();
        let org_name = organization.name.clone();
        let token_for_email = raw_token.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_invitation(&email, &org_name, &inviter_name, &token_for_email)
                .await
            {
                tracing::warn!(error = %e, "invitation email failed");
            }
        });

        Ok((invitation, raw_token))
    }

    /// Consume a pending invitation: creates the corporate account with its
    /// pre-assigned role and MFA flags already set.
    pub async fn accept_invitation(
        &self,
        token: &str,
        req: AcceptInvitationRequest,
    ) -> Result<Account, ServiceError> {
        let invitation = self
            .store
            .invitation_by_token_hash(&sha256_hex(token))
            .await?
            .filter(Invitation::is_pending)
            .ok_or_else(|| {
                ServiceError::NotFound("Invitation not found or already used".into())
            })?;

        if invitation.is_expired() {
            return Err(ServiceError::Forbidden("Invitation has expired".into()));
        }

        if self
            .store
            .account_by_email(&invitation.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict("Email already registered".into()));
        }
        if self
            .store
            .account_by_username(&req.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict("Username already taken".into()));
        }

        let password = Password::new(req.password);
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))??;

        let mut account = Account::new(
            invitation.email.clone(),
            req.username,
            Some(password_hash.into_string()),
        );
        account.account_type_code = AccountType::Corporate.as_str().to_string();
        account.organization_id = Some(invitation.organization_id);
        account.first_name = req.first_name;
        account.last_name = req.last_name;
        // MFA is mandatory for corporate accounts from the first moment.
        account.mfa_enabled = true;
        account.mfa_setup_complete = true;

        self.store.insert_account(&account).await?;
        self.store
            .insert_role_assignment(&RoleAssignment::new(
                account.account_id,
                invitation.role_id,
                invitation.organization_id,
            ))
            .await?;
        self.store
            .mark_invitation_accepted(invitation.invitation_id)
            .await?;

        tracing::info!(
            account_id = %account.account_id,
            organization_id = %invitation.organization_id,
            "Invitation accepted"
        );
        self.dispatch_audit(
            AuditEvent::new(
                account.account_id,
                "organization.invitation_accepted",
                "Invitation",
                Some(invitation.invitation_id),
            )
            .in_organization(invitation.organization_id),
        );

        Ok(account)
    }

    /// Detach a member from the organization and drop their assignments
    /// there.
    pub async fn remove_member(
        &self,
        admin_id: Uuid,
        organization_id: Uuid,
        member_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.rbac.ensure_admin(admin_id, organization_id).await?;

        let member = self
            .store
            .account_by_id(member_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Member not found".into()))?;
        if member.organization_id != Some(organization_id) {
            return Err(ServiceError::NotFound(
                "Member is not in this organization".into(),
            ));
        }

        self.store
            .set_account_organization(member_id, None)
            .await?;
        self.store
            .delete_assignments_for_member(member_id, organization_id)
            .await?;

        self.dispatch_audit(
            AuditEvent::new(admin_id, "organization.member_removed", "Account", Some(member_id))
                .in_organization(organization_id),
        );

        Ok(())
    }

    /// Member listing with per-member role names.
    pub async fn members(
        &self,
        requester_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<(Account, Vec<String>)>, ServiceError> {
        self.rbac.ensure_admin(requester_id, organization_id).await?;

        let accounts = self.store.members_of_organization(organization_id).await?;
        let mut members = Vec::with_capacity(accounts.len());
        for account in accounts {
            let roles = self
                .store
                .role_names_for_account_in_org(account.account_id, organization_id)
                .await?;
            members.push((account, roles));
        }
        Ok(members)
    }

    /// Roles visible to the organization: the system roles plus its own.
    pub async fn roles(
        &self,
        requester_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<Role>, ServiceError> {
        self.rbac.ensure_admin(requester_id, organization_id).await?;
        let roles = self.store.roles_in_organization(organization_id).await?;
        Ok(roles)
    }

    /// Create a custom role scoped to the organization.
    pub async fn create_role(
        &self,
        admin_id: Uuid,
        organization_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<Role, ServiceError> {
        self.rbac.ensure_admin(admin_id, organization_id).await?;

        let existing = self.store.roles_in_organization(organization_id).await?;
        if existing.iter().any(|r| r.name == name) {
            return Err(ServiceError::Conflict("Role name already in use".into()));
        }

        let role = Role::new(organization_id, name, description);
        self.store.insert_role(&role).await?;

        self.dispatch_audit(
            AuditEvent::new(admin_id, "organization.role_created", "Role", Some(role.role_id))
                .in_organization(organization_id),
        );

        Ok(role)
    }

    /// Assign a role to a member. The role must be system-wide or belong to
    /// this organization; the member must belong to this organization.
    /// Idempotent.
    pub async fn assign_role(
        &self,
        admin_id: Uuid,
        organization_id: Uuid,
        role_id: Uuid,
        member_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.rbac.ensure_admin(admin_id, organization_id).await?;

        let member = self
            .store
            .account_by_id(member_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Member not found".into()))?;
        if member.organization_id != Some(organization_id) {
            return Err(ServiceError::NotFound(
                "Member is not in this organization".into(),
            ));
        }

        let role = self
            .store
            .role_by_id(role_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Role not found".into()))?;
        if !role.is_system_role && role.organization_id != Some(organization_id) {
            return Err(ServiceError::NotFound("Role not found".into()));
        }

        self.store
            .insert_role_assignment(&RoleAssignment::new(member_id, role_id, organization_id))
            .await?;

        self.dispatch_audit(
            AuditEvent::new(admin_id, "organization.role_assigned", "Account", Some(member_id))
                .in_organization(organization_id),
        );

        Ok(())
    }

    /// Revoke a role assignment.
    pub async fn revoke_role(
        &self,
        admin_id: Uuid,
        organization_id: Uuid,
        role_id: Uuid,
        member_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.rbac.ensure_admin(admin_id, organization_id).await?;

        let removed = self
            .store
            .delete_role_assignment(member_id, role_id, organization_id)
            .await?;
        if !removed {
            return Err(ServiceError::NotFound("Role assignment not found".into()));
        }

        self.dispatch_audit(
            AuditEvent::new(admin_id, "organization.role_revoked", "Account", Some(member_id))
                .in_organization(organization_id),
        );

        Ok(())
    }

    fn dispatch_audit(&self, event: AuditEvent) {
        let sink = self.audit.clone();
        tokio::spawn(async move {
            sink.record(event).await;
        });
    }
}
