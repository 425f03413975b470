pub mod auth;

use serde::Serialize;
use utoipa::ToSchema;

/// Generic error body: a stable machine-readable code plus a human message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Generic message body for operations with nothing else to return.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
