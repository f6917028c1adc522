//! HTTP relay module.
//!
//! This module provides the inbound HTTP surface: the shared-secret
//! gatekeeper, request-shape normalization, and the buffered or streamed
//! relay of upstream responses.

pub mod auth;
mod handlers;
pub mod normalize;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use normalize::{normalize_chat, normalize_simple, Shape, ValidationError};
pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use types::{CanonicalPayload, ChatMessage, Message, Role, DEFAULT_MODEL};
pub use upstream::UpstreamClient;
