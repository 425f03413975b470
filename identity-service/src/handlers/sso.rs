//! SSO endpoints: authorize-URL handoff and the OAuth callback.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    dtos::auth::{AuthorizeUrlResponse, SsoCallbackQuery},
    handlers::auth::login_outcome_response,
    services::ServiceError,
    AppState,
};

/// Authorization URL for the given provider; the frontend redirects the
/// user there.
#[utoipa::path(
    get,
    path = "/sso/{provider}/authorize",
    responses(
        (status = 200, description = "Provider authorization URL", body = AuthorizeUrlResponse),
        (status = 400, description = "Unsupported provider", body = ErrorResponse)
    ),
    tag = "SSO"
)]
pub async fn authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let url = state.sso.authorize_url(&provider)?;
    Ok((StatusCode::OK, Json(AuthorizeUrlResponse { url })))
}

/// OAuth callback: exchanges the code, resolves the local account, then
/// behaves exactly like the credential step of a login.
#[utoipa::path(
    get,
    path = "/sso/{provider}/callback",
    responses(
        (status = 200, description = "Token pair, or a two-factor challenge", body = AuthResponse),
        (status = 400, description = "Provider error", body = ErrorResponse)
    ),
    tag = "SSO"
)]
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<SsoCallbackQuery>,
) -> Result<Response, ServiceError> {
    // Providers report user-denied consent and their own failures here.
    if let Some(error) = query.error {
        return Err(ServiceError::ProviderError(error));
    }

    let outcome = state.sso.callback(&provider, &query.code).await?;
    Ok(login_outcome_response(outcome))
}
