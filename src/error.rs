// src/error.rs

use std::sync::OnceLock;

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{services::ExamError, store::StoreError};

static EXPOSE_ERROR_DETAILS: OnceLock<bool> = OnceLock::new();

/// Controls whether error responses carry the `error` detail field.
/// Set once at startup; details are shown when never set.
pub fn set_expose_error_details(expose: bool) {
    let _ = EXPOSE_ERROR_DETAILS.set(expose);
}

fn expose_error_details() -> bool {
    *EXPOSE_ERROR_DETAILS.get().unwrap_or(&true)
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (role mismatch, not assigned, not the owner)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (concurrent modification, duplicate attempt number)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Produces `{ success: false, message, error }` with the matching status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    msg,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "Bad Request".to_string()),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "Forbidden".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "Not Found".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "Conflict".to_string()),
        };

        let body = if expose_error_details() {
            json!({ "success": false, "message": message, "error": detail })
        } else {
            json!({ "success": false, "message": message })
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::NotFound(msg) => AppError::NotFound(msg),
            ExamError::Forbidden(msg) => AppError::Forbidden(msg),
            ExamError::Store(e) => AppError::from(e),
            other @ (ExamError::OutOfWindow
            | ExamError::AttemptLimitExceeded
            | ExamError::Validation(_)
            | ExamError::InvalidState { .. }) => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
