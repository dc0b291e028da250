use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The error vocabulary of the portal, mapped onto HTTP statuses by the
/// `IntoResponse` impl below. Handlers return these directly; repository
/// failures convert via `From<RepositoryError>`.
///
/// Failure bodies are JSON of the shape `{"error": "...", "field": "..."}`
/// where `field` is only present for validation failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or logically inconsistent input. Carries the offending
    /// field, and optionally the in-progress submission so the caller can
    /// correct and resubmit. No partial write has occurred when this is
    /// returned.
    #[error("validation failed on '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
        submission: Option<serde_json::Value>,
    },

    /// The caller is authenticated but lacks the required role or
    /// ownership. Reported generically; the target's existence is not
    /// hidden, only the mutation is blocked.
    #[error("not authorized to perform this operation")]
    Authorization,

    /// Missing or invalid credentials (bad token, banned account, failed
    /// login).
    #[error("authentication required")]
    Unauthorized,

    /// The referenced entity does not exist. Also covers out-of-window
    /// articles on the anonymous surface, which are indistinguishable from
    /// absent ones.
    #[error("not found")]
    NotFound,

    /// A uniqueness or concurrency-token conflict. The caller may re-read
    /// current state and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying persistence operation failed. Reported generically;
    /// details go to the log only.
    #[error("operation failed")]
    OperationFailed,
}

impl ApiError {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
            submission: None,
        }
    }

    /// A validation failure that echoes the rejected submission back so the
    /// caller can correct it and resubmit.
    pub fn rejected_submission<T: serde::Serialize>(
        field: &'static str,
        message: impl Into<String>,
        submission: &T,
    ) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
            submission: serde_json::to_value(submission).ok(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Authorization => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ApiError::Validation {
                field,
                message,
                submission,
            } => {
                let mut body = json!({
                    "error": message,
                    "field": field,
                });
                if let Some(submission) = submission {
                    body["submission"] = submission.clone();
                }
                body
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
