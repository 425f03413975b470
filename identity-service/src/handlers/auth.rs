//! Core authentication endpoints: register, login, MFA completion,
//! refresh, logout. Thin shims over the login orchestrator.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    dtos::auth::{
        ChangePasswordRequest, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
        TwoFactorChallengeResponse, TwoFactorLoginRequest,
    },
    dtos::MessageResponse,
    middleware::AuthUser,
    services::{LoginOutcome, ServiceError},
    utils::ValidatedJson,
    AppState,
};

/// Map a login outcome onto its wire shape: tokens, or the structurally
/// distinct MFA-pending body.
pub(crate) fn login_outcome_response(outcome: LoginOutcome) -> Response {
    match outcome {
        LoginOutcome::Authenticated(auth) => (StatusCode::OK, Json(auth)).into_response(),
        LoginOutcome::SecondFactorRequired { two_factor_token } => (
            StatusCode::OK,
            Json(TwoFactorChallengeResponse {
                two_factor_token,
                require_2fa: true,
            }),
        )
            .into_response(),
    }
}

/// Register a new individual account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 409, description = "Email or username already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let res = state.login.register(req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair, or a two-factor challenge", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state.login.login(&req.email, &req.password).await?;
    Ok(login_outcome_response(outcome))
}

/// Complete an MFA login with a challenge token and TOTP code
#[utoipa::path(
    post,
    path = "/auth/login/2fa",
    request_body = TwoFactorLoginRequest,
    responses(
        (status = 200, description = "Token pair", body = AuthResponse),
        (status = 401, description = "Invalid challenge or code", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login_2fa(
    State(state): State<AppState>,
    Json(req): Json<TwoFactorLoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let res = state
        .login
        .complete_second_factor(&req.two_factor_token, &req.code)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Exchange a refresh token for a fresh pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair; the old refresh token is dead", body = AuthResponse),
        (status = 401, description = "Invalid session", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let res = state.login.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Logout: revoke the refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out; idempotent")
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state.login.logout(&req.refresh_token).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Current account profile
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated account", body = AccountResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.login.current_account(user.account_id()?).await?;
    Ok((StatusCode::OK, Json(account.sanitized())))
}

/// Change password; all live sessions are revoked
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password incorrect", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .login
        .change_password(user.account_id()?, &req.current_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
