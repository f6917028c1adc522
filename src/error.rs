//! Error types for ask-relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::proxy::normalize::ValidationError;

/// Result type alias for ask-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ask-relay.
///
/// Display strings are the exact messages returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unauthorized: Invalid or missing secret token")]
    Unauthorized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport or decode failure while talking to the upstream.
    #[error("Proxy server error")]
    Upstream(#[source] reqwest::Error),

    #[error("Failed to fetch models from OpenAI")]
    Models { status: StatusCode },

    #[error("Not found")]
    NotFound,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Models { status } => *status,
            Error::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
