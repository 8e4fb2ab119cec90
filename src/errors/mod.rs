//! Error handling module for the roster backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const MALFORMED_RECORD: &str = "MALFORMED_RECORD";
    pub const DATE_PARSE_FAILURE: &str = "DATE_PARSE_FAILURE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
///
/// An under-filled roster is not an error: the selector reports a shortfall as data.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Optimistic concurrency conflict against the in-process revision
    Conflict {
        message: String,
        current_version: i64,
    },
    /// The blob store could not be reached or rejected the call
    StoreUnavailable(String),
    /// A stored or uploaded row violates the table format
    MalformedRecord(String),
    /// A roster file name does not carry a parsable service date
    DateParseFailure(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MalformedRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DateParseFailure(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict { .. } => codes::VERSION_MISMATCH,
            AppError::StoreUnavailable(_) => codes::STORE_UNAVAILABLE,
            AppError::MalformedRecord(_) => codes::MALFORMED_RECORD,
            AppError::DateParseFailure(_) => codes::DATE_PARSE_FAILURE,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::StoreUnavailable(msg)
            | AppError::MalformedRecord(msg)
            | AppError::DateParseFailure(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg) => msg.clone(),
            AppError::Conflict { message, .. } => message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<csv_async::Error> for AppError {
    fn from(err: csv_async::Error) -> Self {
        tracing::error!("CSV error: {:?}", err);
        AppError::MalformedRecord(format!("CSV error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision_id: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision_id: i64) -> Self {
        let details = match error {
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({ "currentVersion": current_version })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
            revision_id,
        }
    }
}

/// Wrapper type for errors that carry revision_id context.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision_id: i64,
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.revision_id);
        (status, Json(body)).into_response()
    }
}
