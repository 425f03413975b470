//! Request and response shapes for the authentication endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::AccountResponse;

/// Request to register a new individual account.
/// Corporate accounts are created through invitations instead.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Second step of an MFA login: challenge token plus the current TOTP code.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorLoginRequest {
    pub two_factor_token: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFactorVerifyRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Successful authentication: token pair plus the account it belongs to.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AccountResponse,
}

/// MFA-pending response. Structurally distinct from [`AuthResponse`] so
/// callers must branch on it.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorChallengeResponse {
    pub two_factor_token: String,
    #[serde(rename = "require2FA")]
    pub require_2fa: bool,
}

/// TOTP enrollment material: base32 secret plus the otpauth URI for QR
/// display. The secret is not yet active at this point.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSetupResponse {
    pub secret: String,
    pub provisioning_uri: String,
}

/// SSO authorize response: the provider URL to redirect the user to.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeUrlResponse {
    pub url: String,
}

/// Query parameters a provider sends back to the callback endpoint.
#[derive(Debug, Deserialize)]
pub struct SsoCallbackQuery {
    #[serde(default)]
    pub code: String,
    pub error: Option<String>,
}
