//! MFA enrollment endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    dtos::auth::{TwoFactorSetupResponse, TwoFactorVerifyRequest},
    middleware::AuthUser,
    services::ServiceError,
    AppState,
};

/// Step 1: generate a TOTP secret and provisioning URI.
/// The secret is stored but inactive until the first code is verified.
#[utoipa::path(
    get,
    path = "/auth/2fa/setup",
    responses(
        (status = 200, description = "Secret and otpauth URI for QR display", body = TwoFactorSetupResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("bearer_auth" = []))
)]
pub async fn setup(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let setup = state.login.enroll_mfa_start(user.account_id()?).await?;
    Ok((
        StatusCode::OK,
        Json(TwoFactorSetupResponse {
            secret: setup.secret,
            provisioning_uri: setup.provisioning_uri,
        }),
    ))
}

/// Step 2: verify the first code from the authenticator app.
/// On success MFA is fully enabled and a fresh token pair is returned.
#[utoipa::path(
    post,
    path = "/auth/2fa/setup/verify",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "MFA enabled; fresh token pair", body = AuthResponse),
        (status = 401, description = "Wrong code", body = ErrorResponse),
        (status = 409, description = "Setup not started", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("bearer_auth" = []))
)]
pub async fn verify_setup(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TwoFactorVerifyRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let res = state
        .login
        .enroll_mfa_verify(user.account_id()?, &req.code)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Disable MFA. Corporate accounts are refused: MFA is mandatory there.
#[utoipa::path(
    delete,
    path = "/auth/2fa",
    responses(
        (status = 204, description = "MFA disabled"),
        (status = 409, description = "MFA is mandatory for this account", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("bearer_auth" = []))
)]
pub async fn disable(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.login.disable_mfa(user.account_id()?).await?;
    Ok(StatusCode::NO_CONTENT)
}
