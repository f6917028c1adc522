//! ask-relay - shared-secret relay for chat-completion requests
//!
//! Accepts chat requests in several informal shapes, normalizes them into the
//! upstream's chat-completions schema, forwards them, and relays the answer
//! back as one JSON document or as a passthrough event stream.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
