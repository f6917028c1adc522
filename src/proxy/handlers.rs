//! HTTP request handlers.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::normalize;
use super::server::{AppState, RequestId};
use super::stream;
use super::types::CanonicalPayload;
use crate::error::Error;

/// Handle POST /chat (OpenAI or prompt/ai shape, auto-detected).
pub async fn chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response, Error> {
    let body = normalize::parse_body(&body)?;
    let payload = normalize::normalize_chat(body)?;
    forward(&state, payload, &request_id).await
}

/// Handle POST /v1/chat/completions (simple shape).
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response, Error> {
    let body = normalize::parse_body(&body)?;
    let payload = normalize::normalize_simple(body)?;
    forward(&state, payload, &request_id).await
}

/// Dispatch a canonical payload upstream and relay the result.
async fn forward(
    state: &AppState,
    payload: CanonicalPayload,
    request_id: &RequestId,
) -> Result<Response, Error> {
    tracing::info!(
        request_id = %request_id.0,
        model = %payload.model,
        stream = payload.stream,
        messages = payload.messages.len(),
        "Forwarding chat completion"
    );

    let upstream_response = state
        .upstream
        .chat_completions(&payload)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id.0, error = %e, "Failed to reach upstream");
            Error::Upstream(e)
        })?;

    tracing::debug!(
        request_id = %request_id.0,
        status = %upstream_response.status(),
        "Upstream responded"
    );

    if payload.stream {
        Ok(relay_streaming(upstream_response).await)
    } else {
        relay_buffered(upstream_response).await
    }
}

/// Relay the full upstream JSON with the upstream's status, errors included.
async fn relay_buffered(upstream_response: reqwest::Response) -> Result<Response, Error> {
    let status = upstream_response.status();
    let body: serde_json::Value = upstream_response.json().await.map_err(|e| {
        tracing::error!(status = %status, error = %e, "Failed to decode upstream response");
        Error::Upstream(e)
    })?;

    if !status.is_success() {
        tracing::warn!(status = %status, "Upstream returned error, passing through");
    }

    Ok((status, Json(body)).into_response())
}

/// Relay an upstream event stream chunk by chunk.
///
/// An upstream rejection arrives before any event has been produced, but the
/// caller asked for an event stream, so it is reported in-band.
async fn relay_streaming(upstream_response: reqwest::Response) -> Response {
    let status = upstream_response.status();
    if !status.is_success() {
        let body = match upstream_response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status = %status, error = %e, "Failed to read upstream error body");
                String::new()
            }
        };
        let message = upstream_error_message(status, &body);
        tracing::warn!(status = %status, error = %message, "Upstream rejected streaming request");
        return stream::error_event_response(&message);
    }

    stream::event_stream_response(upstream_response.bytes_stream())
}

/// Pick a human-readable message out of an upstream error body.
///
/// Understands `{"error": {"message": ..}}` and `{"error": ".."}`; anything
/// else falls back to the status line.
fn upstream_error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let message = error
        .and_then(|e| e.get("message"))
        .or(error)
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty());

    match message {
        Some(message) => message.to_string(),
        None => format!("upstream returned {}", status),
    }
}

/// Handle GET /v1/models - passthrough of the upstream model catalog.
pub async fn list_models(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Response, Error> {
    tracing::info!(request_id = %request_id.0, "Listing upstream models");

    let upstream_response = state.upstream.list_models().await.map_err(|e| {
        tracing::error!(request_id = %request_id.0, error = %e, "Failed to reach upstream");
        Error::Models {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    })?;

    let status = upstream_response.status();
    if !status.is_success() {
        tracing::warn!(request_id = %request_id.0, status = %status, "Upstream model listing failed");
        return Err(Error::Models { status });
    }

    let body: serde_json::Value = upstream_response.json().await.map_err(|e| {
        tracing::error!(request_id = %request_id.0, error = %e, "Failed to decode model listing");
        Error::Models {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    })?;

    Ok((status, Json(body)).into_response())
}

/// Fallback for unknown routes.
pub async fn not_found() -> Error {
    Error::NotFound
}
