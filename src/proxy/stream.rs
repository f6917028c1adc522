//! Event-stream relay.
//!
//! A producer task reads the upstream byte stream and pushes one
//! [`RelayFrame`] per upstream chunk into a bounded channel. The client
//! response body drains that channel. Normal completion and upstream failure
//! are distinct terminal frames: `End` closes the body, `Error` writes a
//! single `data: [ERROR] <message>` line and then closes it.
//!
//! When the client goes away the body (and with it the receiver) is dropped.
//! The producer notices on its next send, or while idle via
//! [`Sender::closed`], and drops the upstream stream, which releases the
//! upstream connection.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Frames buffered between upstream and client before the producer waits.
const CHANNEL_CAPACITY: usize = 32;

/// A unit of work handed from the upstream reader to the client writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// Raw upstream bytes, forwarded unmodified.
    Chunk(Bytes),
    /// Upstream finished cleanly.
    End,
    /// Upstream failed; the message is written in-band before closing.
    Error(String),
}

/// The in-band terminal line written when the upstream stream fails.
pub fn error_line(message: &str) -> Bytes {
    Bytes::from(format!("data: [ERROR] {}\n\n", message))
}

/// Spawn the producer side of the relay and return its receiving end.
pub fn spawn_relay<S, E>(upstream: S) -> Receiver<RelayFrame>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(pump(upstream, tx));
    rx
}

async fn pump<S, E>(upstream: S, tx: Sender<RelayFrame>)
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let mut upstream = Box::pin(upstream);
    let mut forwarded: u64 = 0;

    loop {
        let next = tokio::select! {
            item = upstream.next() => item,
            _ = tx.closed() => {
                tracing::debug!(chunks = forwarded, "Client disconnected, dropping upstream stream");
                return;
            }
        };

        let frame = match next {
            Some(Ok(chunk)) => {
                forwarded += 1;
                RelayFrame::Chunk(chunk)
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, chunks = forwarded, "Stream error from upstream");
                RelayFrame::Error(e.to_string())
            }
            None => RelayFrame::End,
        };
        let terminal = !matches!(frame, RelayFrame::Chunk(_));

        if tx.send(frame).await.is_err() {
            tracing::debug!(chunks = forwarded, "Client disconnected, dropping upstream stream");
            return;
        }
        if terminal {
            tracing::debug!(chunks = forwarded, "Upstream stream finished");
            return;
        }
    }
}

/// Turn the receiving end of a relay into client body chunks.
///
/// Yields exactly one item per `Chunk` frame, plus the error line if the
/// relay ends with `Error`.
pub fn frames_into_stream(
    rx: Receiver<RelayFrame>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    futures::stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        match rx.recv().await? {
            RelayFrame::Chunk(bytes) => Some((Ok::<_, Infallible>(bytes), Some(rx))),
            RelayFrame::Error(message) => Some((Ok(error_line(&message)), None)),
            RelayFrame::End => None,
        }
    })
}

/// Build a `200 text/event-stream` response relaying `upstream` chunk by chunk.
pub fn event_stream_response<S, E>(upstream: S) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let rx = spawn_relay(upstream);
    with_event_stream_headers(Body::from_stream(frames_into_stream(rx)))
}

/// Build an event-stream response that carries only the in-band error line.
///
/// Used when the upstream rejects a streaming request outright: the caller
/// asked for an event stream, so the failure is reported inside one.
pub fn error_event_response(message: &str) -> Response {
    with_event_stream_headers(Body::from(error_line(message)))
}

fn with_event_stream_headers(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
