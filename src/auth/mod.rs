//! Pre-shared key authentication for the roster API.
//!
//! Keys are compared in constant time.

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppErrorWithRevision};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware rejecting requests without the configured key.
///
/// With no key configured every request passes.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    match provided_key(request.headers()) {
        Some(key) if keys_match(key, &expected) => next.run(request).await,
        Some(_) => unauthorized("Invalid API key"),
        None => unauthorized("Missing API key"),
    }
}

/// Key from `x-api-key`, falling back to an `Authorization: Bearer` token.
fn provided_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .map(str::trim)
}

fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    tracing::debug!("Rejected request: {}", message);
    AppErrorWithRevision {
        error: AppError::Unauthorized(message.to_string()),
        revision_id: 0,
    }
    .into_response()
}
