use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// One field-level validation problem, reported alongside its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Application error taxonomy. Every handler returns `Result<_, ApiError>`;
/// the `IntoResponse` impl is the single place errors become HTTP.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("email already registered")]
    DuplicateEmail,

    /// Bad login. Deliberately covers unknown email, wrong password and
    /// deactivated accounts alike so responses cannot enumerate accounts.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    /// Unified not-found / not-owner signal. A mutation against someone
    /// else's record must look exactly like a mutation against a missing id.
    #[error("not found")]
    NotFound(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Validation failed", "details": details }),
            ),
            ApiError::DuplicateEmail => (
                StatusCode::CONFLICT,
                serde_json::json!({ "error": "User with this email already exists" }),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Invalid credentials" }),
            ),
            ApiError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Invalid token" }),
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Token expired" }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": format!("{what} not found") }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": "Admin access required" }),
            ),
            ApiError::Internal(e) => {
                // Full detail stays server-side; the caller gets an opaque body.
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
