//! Organization endpoints: creation, invitations, membership.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    dtos::MessageResponse,
    middleware::AuthUser,
    models::invitation::{AcceptInvitationRequest, CreateInvitationRequest, InvitationResponse},
    models::organization::{CreateOrganizationRequest, MemberResponse, OrganizationResponse},
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// Create an organization; the caller becomes its Admin.
#[utoipa::path(
    post,
    path = "/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let organization = state
        .orgs
        .create(user.account_id()?, req.name, req.domain)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse::from(organization)),
    ))
}

/// List members with their role names. Admin only.
#[utoipa::path(
    get,
    path = "/organizations/{org_id}/members",
    responses(
        (status = 200, description = "Members with roles", body = [MemberResponse]),
        (status = 403, description = "Admin privileges required", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let members = state.orgs.members(user.account_id()?, org_id).await?;
    let body: Vec<MemberResponse> = members
        .into_iter()
        .map(|(account, roles)| MemberResponse {
            id: account.account_id,
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            roles,
            joined_utc: account.created_utc,
        })
        .collect();
    Ok((StatusCode::OK, Json(body)))
}

/// Invite a member by email with a pre-assigned role. Admin only.
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation sent", body = InvitationResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let (invitation, _token) = state
        .orgs
        .invite_member(user.account_id()?, org_id, req.email, req.role_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse::from(invitation)),
    ))
}

/// Accept an invitation: creates the corporate account with its role.
#[utoipa::path(
    post,
    path = "/invitations/{token}/accept",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 404, description = "Invitation not found or already used", body = ErrorResponse),
        (status = 403, description = "Invitation has expired", body = ErrorResponse)
    ),
    tag = "Organizations"
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(req): ValidatedJson<AcceptInvitationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state.orgs.accept_invitation(&token, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Account created. You can now log in.".to_string(),
        }),
    ))
}

/// Remove a member from the organization. Admin only.
#[utoipa::path(
    delete,
    path = "/organizations/{org_id}/members/{member_id}",
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((org_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .orgs
        .remove_member(user.account_id()?, org_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
