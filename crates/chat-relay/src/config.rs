use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::{GeminiProvider, Provider, RestBodyFormat};

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_saphyr::from_str(&contents)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// `API_URL` sets the REST base URL, `GEMINI_API_KEY` the Gemini key and
    /// `CHAT_RELAY_PROVIDER` the provider. Empty values are ignored.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("API_URL") {
            self.rest.base_url = url;
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(provider) = get("CHAT_RELAY_PROVIDER") {
            self.relay.provider = provider.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    /// Check settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.rest.base_url).map_err(|e| {
            ConfigError::Invalid(format!("rest.base_url '{}': {e}", self.rest.base_url))
        })?;

        for (name, value) in [
            ("server.request_timeout_seconds", self.server.request_timeout_seconds),
            ("server.keep_alive_interval_seconds", self.server.keep_alive_interval_seconds),
            ("relay.upstream_timeout_seconds", self.relay.upstream_timeout_seconds),
            ("streaming.idle_timeout_seconds", self.streaming.idle_timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }

        // Upstream and identity calls must give up before the request timeout
        // answers for them.
        if self.relay.upstream_timeout_seconds >= self.server.request_timeout_seconds {
            return Err(ConfigError::Invalid(format!(
                "relay.upstream_timeout_seconds ({}) must be less than server.request_timeout_seconds ({})",
                self.relay.upstream_timeout_seconds, self.server.request_timeout_seconds
            )));
        }

        if self.relay.provider == Provider::Gemini && self.gemini.api_key.is_none() {
            return Err(ConfigError::Invalid(
                "gemini provider selected but no API key configured (set GEMINI_API_KEY)".into(),
            ));
        }

        match self.auth.verifier {
            VerifierKind::Static if self.auth.static_tokens.is_empty() => {
                Err(ConfigError::Invalid(
                    "auth.verifier is 'static' but auth.static_tokens is empty".into(),
                ))
            }
            VerifierKind::IdentityToolkit if self.auth.identity_api_key.is_none() => {
                Err(ConfigError::Invalid(
                    "auth.verifier is 'identity_toolkit' but auth.identity_api_key is not set"
                        .into(),
                ))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            keep_alive_interval_seconds: default_keep_alive_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_keep_alive_interval() -> u64 {
    15
}

// ============================================================================
// RelayConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub provider: Provider,
    /// Bound on a buffered upstream call, or on the first byte of a stream.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
}

impl RelayConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            upstream_timeout_seconds: default_upstream_timeout(),
        }
    }
}

fn default_upstream_timeout() -> u64 {
    60
}

// ============================================================================
// RestConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub body_format: RestBodyFormat,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_rest_base_url(),
            body_format: RestBodyFormat::default(),
        }
    }
}

fn default_rest_base_url() -> String {
    "http://localhost:8000".to_string()
}

// ============================================================================
// GeminiConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

fn default_gemini_base_url() -> String {
    GeminiProvider::DEFAULT_BASE_URL.to_string()
}

fn default_gemini_model() -> String {
    GeminiProvider::DEFAULT_MODEL.to_string()
}

// ============================================================================
// AuthConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Reject requests that carry no bearer token.
    #[serde(default = "default_auth_required")]
    pub required: bool,
    #[serde(default)]
    pub verifier: VerifierKind,
    /// Accepted tokens for the `static` verifier.
    #[serde(default)]
    pub static_tokens: Vec<String>,
    /// API key for the `identity_toolkit` verifier.
    #[serde(default)]
    pub identity_api_key: Option<String>,
    #[serde(default = "default_identity_base_url")]
    pub identity_base_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: default_auth_required(),
            verifier: VerifierKind::default(),
            static_tokens: Vec::new(),
            identity_api_key: None,
            identity_base_url: default_identity_base_url(),
        }
    }
}

/// How forwarded tokens are checked before the upstream call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierKind {
    /// Trust the token; it was verified before reaching us.
    #[default]
    None,
    /// Compare against `static_tokens`.
    Static,
    /// Look the token up with the identity provider.
    IdentityToolkit,
}

fn default_auth_required() -> bool {
    true
}

fn default_identity_base_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

// ============================================================================
// StreamingConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StreamingConfig {
    #[serde(default)]
    pub framing: Framing,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

/// Wire framing for streamed replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Chunked `text/plain`, fragments written verbatim.
    #[default]
    Text,
    /// Server-Sent Events.
    Sse,
}

fn default_idle_timeout() -> u64 {
    60
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================
