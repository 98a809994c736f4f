//! The chat relay adapter.
//!
//! Takes a client's conversation, picks the latest user message, makes one
//! call to the configured provider, and shapes the reply for the browser.
//! Stateless per call; nothing is kept once the response is written.

mod error;
mod stream;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info_span, warn};

use crate::auth::{BearerToken, TokenVerifier};
use crate::llm::{ChatStream, CompletionProvider, Message, ProviderRequest, Reply, Role};

pub use error::{
    INVALID_TOKEN_MESSAGE, NO_TOKEN_MESSAGE, RelayError, UNKNOWN_MESSAGE,
    UPSTREAM_FALLBACK_MESSAGE,
};
pub use stream::{Fragment, RelayStream};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Inbound body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ChatRequest {
    /// Decode a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RelayError::MalformedRequest("empty body".to_string()));
        }
        serde_json::from_slice(body).map_err(|e| RelayError::MalformedRequest(e.to_string()))
    }
}

/// Buffered reply sent to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub message: String,
    pub timestamp: String,
}

/// What the relay produced for one call.
pub enum RelayReply {
    Message(ChatResponse),
    Stream(ChatStream),
}

impl std::fmt::Debug for RelayReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayReply::Message(m) => f.debug_tuple("Message").field(m).finish(),
            RelayReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ============================================================================
// ChatRelay
// ============================================================================

/// Relays one conversation turn to the configured provider.
pub struct ChatRelay {
    provider: Arc<dyn CompletionProvider>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    auth_required: bool,
}

impl ChatRelay {
    /// A relay that requires a token and trusts it without verification.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            verifier: None,
            auth_required: true,
        }
    }

    /// Check tokens with `verifier` before calling upstream.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    #[must_use]
    pub fn require_auth(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Handle one request.
    ///
    /// `header_token` is the bearer token from the inbound `Authorization`
    /// header; the body's `idToken` takes precedence over it.
    pub async fn relay(
        &self,
        request: ChatRequest,
        header_token: Option<BearerToken>,
    ) -> Result<RelayReply, RelayError> {
        let request_id = format!("req_{}", ulid::Ulid::new());
        let span = info_span!(
            "relay",
            request_id = %request_id,
            provider = self.provider.name()
        );
        self.relay_inner(request, header_token)
            .instrument(span)
            .await
    }

    async fn relay_inner(
        &self,
        request: ChatRequest,
        header_token: Option<BearerToken>,
    ) -> Result<RelayReply, RelayError> {
        let token = request
            .id_token
            .as_deref()
            .and_then(BearerToken::non_blank)
            .or(header_token);

        let token = self.authorize(token).await?;

        let Some(last_user) = select_last_user_message(&request.messages) else {
            debug!(messages = request.messages.len(), "no user message in request");
            return Err(RelayError::MissingUserMessage);
        };

        let provider_request = ProviderRequest {
            message: last_user.content.clone(),
            context: request.context.unwrap_or_default(),
            session_id: request.session_id,
            authorization: token,
            history: request.messages,
        };

        let reply = self.provider.complete(provider_request).await.map_err(|e| {
            warn!(error = %e, "upstream call failed");
            RelayError::from(e)
        })?;

        Ok(match reply {
            Reply::Message(completion) => RelayReply::Message(ChatResponse {
                message: completion.message,
                timestamp: now_iso8601(),
            }),
            Reply::Stream(stream) => RelayReply::Stream(stream),
        })
    }

    /// Apply the token policy. Returns the token to forward, if any.
    async fn authorize(
        &self,
        token: Option<BearerToken>,
    ) -> Result<Option<BearerToken>, RelayError> {
        let Some(token) = token else {
            if self.auth_required {
                return Err(RelayError::Unauthorized(NO_TOKEN_MESSAGE));
            }
            return Ok(None);
        };

        if let Some(ref verifier) = self.verifier {
            let principal = verifier.verify(&token).await.map_err(|e| {
                warn!(error = %e, "token verification failed");
                RelayError::from(e)
            })?;
            debug!(principal = %principal.id, "token verified");
        }

        Ok(Some(token))
    }
}

/// The most recent message with role `user`, scanning from the end.
pub fn select_last_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
