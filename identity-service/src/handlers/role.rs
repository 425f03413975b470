//! RBAC role management endpoints. Admin-gated via the RBAC resolver.

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
    models::role::{CreateRoleRequest, RoleResponse},
    services::ServiceError,
    AppState,
};

/// Roles available in this organization: system roles plus its own.
#[utoipa::path(
    get,
    path = "/organizations/{org_id}/roles",
    responses(
        (status = 200, description = "Available roles", body = [RoleResponse])
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let roles = state.orgs.roles(user.account_id()?, org_id).await?;
    let body: Vec<RoleResponse> = roles.into_iter().map(RoleResponse::from).collect();
    Ok((StatusCode::OK, Json(body)))
}

/// Create a custom role scoped to this organization.
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 409, description = "Role name already in use", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<Uuid>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let role = state
        .orgs
        .create_role(user.account_id()?, org_id, req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

/// Assign a role to a member. Idempotent.
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/roles/{role_id}/assign/{member_id}",
    responses(
        (status = 200, description = "Role assigned", body = MessageResponse),
        (status = 404, description = "Member or role not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn assign(
    State(state): State<AppState>,
    user: AuthUser,
    Path((org_id, role_id, member_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .orgs
        .assign_role(user.account_id()?, org_id, role_id, member_id)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Role assigned".to_string(),
        }),
    ))
}

/// Revoke a role assignment.
#[utoipa::path(
    delete,
    path = "/organizations/{org_id}/roles/{role_id}/assign/{member_id}",
    responses(
        (status = 204, description = "Role revoked"),
        (status = 404, description = "Role assignment not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn revoke(
    State(state): State<AppState>,
    user: AuthUser,
    Path((org_id, role_id, member_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .orgs
        .revoke_role(user.account_id()?, org_id, role_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Effective role names for a member in this organization.
#[utoipa::path(
    get,
    path = "/organizations/{org_id}/members/{member_id}/roles",
    responses(
        (status = 200, description = "Effective role names", body = [String])
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn member_roles(
    State(state): State<AppState>,
    user: AuthUser,
    Path((org_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    // Admins can inspect anyone; members can inspect themselves.
    let requester = user.account_id()?;
    if requester != member_id && !state.rbac.is_admin(requester, org_id).await? {
        return Err(ServiceError::Forbidden("Admin privileges required".into()));
    }

    let mut roles: Vec<String> = state
        .rbac
        .effective_roles(member_id, org_id)
        .await?
        .into_iter()
        .collect();
    roles.sort();
    Ok((StatusCode::OK, Json(roles)))
}
