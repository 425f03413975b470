//! Password reset endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    dtos::auth::{ForgotPasswordRequest, ResetPasswordRequest},
    dtos::MessageResponse,
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// Step 1: send a reset link. Always reports success so the endpoint
/// cannot be used to enumerate registered emails.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Always succeeds", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> impl IntoResponse {
    state.reset.request(&req.email).await;
    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "If an account exists for that email, a reset link has been sent."
                .to_string(),
        }),
    )
}

/// Step 2: submit the emailed token plus a new password.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 401, description = "Invalid or expired reset token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state.reset.reset(&req.token, &req.new_password).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password reset successfully. You can now log in.".to_string(),
        }),
    ))
}
