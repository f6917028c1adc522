//! Shared-secret gatekeeper.
//!
//! Runs in front of every route, including the 404 fallback. A request
//! without a matching `x-api-secret` header is answered with 401 before its
//! body is read and before any upstream call is made.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::server::AppState;
use crate::config::SharedSecret;
use crate::error::Error;

/// Header carrying the caller's shared secret.
pub const SECRET_HEADER: &str = "x-api-secret";

/// Whether the request headers carry the configured secret.
///
/// Repeated headers are not tried one by one: only the first value counts.
pub fn is_authorized(headers: &HeaderMap, secret: &SharedSecret) -> bool {
    headers
        .get(SECRET_HEADER)
        .is_some_and(|value| secret.matches(value.as_bytes()))
}

/// Middleware rejecting requests that do not present the shared secret.
pub async fn require_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !is_authorized(request.headers(), &state.config.secret) {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request with invalid or missing secret"
        );
        return Error::Unauthorized.into_response();
    }
    next.run(request).await
}
