//! REST delegate: forwards the latest user message to a custom chat API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{LLMError, api_error, detail_text};
use super::provider::CompletionProvider;
use super::types::{Completion, ProviderRequest, Reply};

/// Shape of the body posted to `{base_url}/chat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestBodyFormat {
    /// `{"message": ..., "context": {...}}`
    #[default]
    Context,
    /// `{"message": ..., "session_id": ...}`
    Session,
}

/// Provider that posts to `{base_url}/chat` and returns a buffered reply.
pub struct RestProvider {
    client: Client,
    base_url: String,
    body_format: RestBodyFormat,
    timeout: Duration,
}

impl RestProvider {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        body_format: RestBodyFormat,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            body_format,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(&self, request: &'a ProviderRequest) -> RequestBody<'a> {
        match self.body_format {
            RestBodyFormat::Context => RequestBody::Context {
                message: &request.message,
                context: &request.context,
            },
            RestBodyFormat::Session => RequestBody::Session {
                message: &request.message,
                session_id: request
                    .session_id
                    .clone()
                    .unwrap_or_else(|| format!("sess_{}", ulid::Ulid::new())),
            },
        }
    }

    async fn send(&self, request: &ProviderRequest) -> Result<Completion, LLMError> {
        let url = format!("{}/chat", self.base_url);

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref token) = request.authorization {
            req = req.header("Authorization", token.header_value());
        }

        let response = req.json(&self.body(request)).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, |v| v.get("detail").and_then(detail_text)).await);
        }

        let body: ResponseBody = response.json().await?;
        debug!(chars = body.message.len(), "rest upstream replied");
        Ok(Completion {
            message: body.message,
            timestamp: body.timestamp,
        })
    }
}

#[async_trait]
impl CompletionProvider for RestProvider {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<Reply, LLMError> {
        match tokio::time::timeout(self.timeout, self.send(&request)).await {
            Ok(result) => result.map(Reply::Message),
            Err(_elapsed) => Err(LLMError::Timeout),
        }
    }
}

// --- Wire types ---

#[derive(Serialize)]
#[serde(untagged)]
enum RequestBody<'a> {
    Context {
        message: &'a str,
        context: &'a serde_json::Map<String, serde_json::Value>,
    },
    Session {
        message: &'a str,
        session_id: String,
    },
}

#[derive(Deserialize)]
struct ResponseBody {
    message: String,
    #[serde(default)]
    timestamp: Option<String>,
}
