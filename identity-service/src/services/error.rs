//! Failure taxonomy for the engine.
//!
//! Everything up to `Validation` is a recoverable, user-facing failure with
//! a stable machine-readable code. `Store` and `Internal` are unexpected
//! faults: logged in full, surfaced as an opaque 500.
//!
//! Deliberately undifferentiated messages: `InvalidCredentials` never says
//! whether the email, the password, or the active flag failed, and
//! `InvalidSession` never says whether a refresh token was missing, expired
//! or revoked.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::dtos::ErrorResponse;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired two-factor token")]
    InvalidChallenge,

    #[error("Invalid two-factor code")]
    InvalidCode,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Two-factor authentication is already enabled. Disable it first.")]
    AlreadyEnrolled,

    #[error("Two-factor setup has not been started")]
    SetupNotStarted,

    #[error("Two-factor authentication is mandatory for corporate accounts and cannot be disabled")]
    MfaMandatory,

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Stable machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::InvalidChallenge => "invalid_challenge",
            ServiceError::InvalidCode => "invalid_code",
            ServiceError::InvalidSession => "invalid_session",
            ServiceError::AlreadyEnrolled => "already_enrolled",
            ServiceError::SetupNotStarted => "setup_not_started",
            ServiceError::MfaMandatory => "mfa_mandatory",
            ServiceError::UnsupportedProvider(_) => "unsupported_provider",
            ServiceError::ProviderError(_) => "provider_error",
            ServiceError::InvalidResetToken => "invalid_reset_token",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Store(_) | ServiceError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidCredentials
            | ServiceError::InvalidChallenge
            | ServiceError::InvalidCode
            | ServiceError::InvalidSession
            | ServiceError::InvalidResetToken => StatusCode::UNAUTHORIZED,
            ServiceError::AlreadyEnrolled
            | ServiceError::SetupNotStarted
            | ServiceError::MfaMandatory
            | ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::UnsupportedProvider(_) | ServiceError::ProviderError(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServiceError::Store(err) => {
                tracing::error!(error = %err, "storage failure");
                None
            }
            ServiceError::Internal(err) => {
                tracing::error!(error = %err, "internal failure");
                None
            }
            other => Some(other.to_string()),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.code().to_string(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::InvalidCredentials.code(), "invalid_credentials");
        assert_eq!(ServiceError::InvalidSession.code(), "invalid_session");
        assert_eq!(
            ServiceError::UnsupportedProvider("x".into()).code(),
            "unsupported_provider"
        );
    }

    #[test]
    fn internal_faults_hide_detail() {
        let err = ServiceError::Internal(anyhow::anyhow!("signing key misconfigured"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_error");
    }
}
