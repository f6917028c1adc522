//! Configuration loading and validation for ask-relay.
//!
//! Configuration is assembled once at startup from (highest precedence first)
//! the process environment, an optional TOML file, and built-in defaults.
//! Secrets only ever come from the environment.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;

/// Environment variable holding the upstream API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable holding the shared secret callers must present.
pub const SECRET_VAR: &str = "API_SECRET_TOKEN";
/// Environment variable overriding the listen port.
pub const PORT_VAR: &str = "PORT";
/// Environment variable overriding the listen host.
pub const HOST_VAR: &str = "HOST";
/// Environment variable overriding the upstream base URL.
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub secret: SharedSecret,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Socket address string suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Upstream completion API configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL without the `/v1/...` suffix (e.g., "https://api.openai.com")
    pub base_url: String,
    pub api_key: ApiKey,
    pub connect_timeout_secs: u64,
}

impl UpstreamConfig {
    /// Full URL of an upstream endpoint path such as `/v1/models`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// API key wrapper that redacts in Debug/Display and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// The single process-wide token every caller must present in `x-api-secret`.
#[derive(Clone)]
pub struct SharedSecret(SecretString);

impl SharedSecret {
    /// Exact byte-for-byte comparison against a presented token.
    ///
    /// Runs over the longer of the two inputs so the comparison time does not
    /// depend on where the first mismatch is.
    pub fn matches(&self, presented: &[u8]) -> bool {
        let expected = self.0.expose_secret().as_bytes();
        let mut diff = (expected.len() != presented.len()) as u8;
        for i in 0..expected.len().max(presented.len()) {
            let a = expected.get(i).copied().unwrap_or(0);
            let b = presented.get(i).copied().unwrap_or(0);
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<&str> for SharedSecret {
    fn from(s: &str) -> Self {
        SharedSecret(SecretString::from(s))
    }
}

impl From<String> for SharedSecret {
    fn from(s: String) -> Self {
        SharedSecret(SecretString::from(s))
    }
}

/// Non-secret settings that may live in a TOML file.
///
/// Unknown keys are rejected so that keys and secrets cannot be put in a file
/// by mistake.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub upstream: FileUpstreamConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileUpstreamConfig {
    pub base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }
}

impl Config {
    /// Load configuration from the real process environment, layered over an
    /// optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => FileConfig::from_file(p)?,
            None => FileConfig::default(),
        };
        Self::from_lookup(file, |name| std::env::var(name).ok())
    }

    /// Build configuration from a file layer and an environment lookup.
    ///
    /// Taking the lookup as a closure keeps this testable without touching
    /// global environment state. Empty values count as unset.
    pub fn from_lookup<F>(file: FileConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var(API_KEY_VAR).ok_or(ConfigError::MissingVar { var: API_KEY_VAR })?;
        let secret = var(SECRET_VAR).ok_or(ConfigError::MissingVar { var: SECRET_VAR })?;

        let port = match var(PORT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { value: raw })?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };
        let host = var(HOST_VAR)
            .or(file.server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let base_url = var(BASE_URL_VAR)
            .or(file.upstream.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let config = Config {
            server: ServerConfig { host, port },
            upstream: UpstreamConfig {
                base_url,
                api_key: ApiKey::from(api_key),
                connect_timeout_secs: file
                    .upstream
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            secret: SharedSecret::from(secret),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.upstream.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Upstream base URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        if !url.starts_with("https://") {
            tracing::warn!(base_url = %url, "Upstream base URL is not HTTPS");
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {var} in environment or .env")]
    MissingVar { var: &'static str },

    #[error("Invalid PORT value '{value}': expected a port number between 0 and 65535")]
    InvalidPort { value: String },

    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
