//! Upstream completion API client.

use std::time::Duration;

use axum::http::header;
use reqwest::Client;

use super::types::CanonicalPayload;
use crate::config::UpstreamConfig;

/// Upstream chat-completions path.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
/// Upstream model-catalog path.
pub const MODELS_PATH: &str = "/v1/models";

/// Bearer-authenticated client for the single configured upstream.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Build a client with the configured connect timeout.
    ///
    /// No overall request timeout is set: a streaming completion can run for
    /// as long as the upstream keeps producing.
    pub fn new(config: UpstreamConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// POST the canonical payload to the chat-completions endpoint.
    ///
    /// Returns the raw response so the caller can choose buffered or
    /// streaming relay. Non-2xx statuses are not errors here.
    pub async fn chat_completions(
        &self,
        payload: &CanonicalPayload,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(self.config.endpoint(CHAT_COMPLETIONS_PATH))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(payload)
            .send()
            .await
    }

    /// GET the upstream model catalog.
    pub async fn list_models(&self) -> reqwest::Result<reqwest::Response> {
        self.http
            .get(self.config.endpoint(MODELS_PATH))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .send()
            .await
    }
}
