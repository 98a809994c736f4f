//! Gemini streaming delegate.
//!
//! Submits the whole conversation to `streamGenerateContent` and relays the
//! candidate text as it arrives over SSE.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{LLMError, api_error, detail_text};
use super::provider::CompletionProvider;
use super::types::{Message, ProviderRequest, Reply, Role, StreamEvent};

/// Provider backed by the Gemini `streamGenerateContent` API.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    #[must_use]
    pub fn new(
        client: Client,
        api_key: String,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            timeout,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<Reply, LLMError> {
        let body = to_request(&request.history);

        let send = self
            .client
            .post(self.url())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send();

        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result?,
            Err(_elapsed) => return Err(LLMError::Timeout),
        };

        if !response.status().is_success() {
            return Err(api_error(response, error_message).await);
        }

        let byte_stream = Box::pin(response.bytes_stream());
        Ok(Reply::Stream(Box::pin(StreamParser::new(byte_stream))))
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(detail_text)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

fn to_request(history: &[Message]) -> Request {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for msg in history {
        let role = match msg.role {
            Role::System => {
                system.push(msg.content.as_str());
                continue;
            }
            Role::User => "user",
            Role::Assistant => "model",
        };
        contents.push(Content {
            role: Some(role),
            parts: vec![Part {
                text: msg.content.clone(),
            }],
        });
    }

    let system_instruction = (!system.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part {
            text: system.join("\n\n"),
        }],
    });

    Request {
        contents,
        system_instruction,
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

impl StreamChunk {
    /// Text of the first candidate, all parts joined.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Turns an SSE byte stream into `StreamEvent`s.
///
/// Emits `Done` exactly once when the body ends, or stops after the first
/// error. Nothing is yielded after either.
struct StreamParser<S> {
    inner: S,
    buffer: Vec<u8>,
    eof: bool,
    done: bool,
}

impl<S> StreamParser<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            eof: false,
            done: false,
        }
    }

    /// Pop the next complete line, without its terminator.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Interpret one SSE line. `None` means nothing to emit.
    fn parse_line(line: &str) -> Option<Result<StreamEvent, LLMError>> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data.is_empty() {
            return None;
        }

        let chunk = match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(data = %data, error = %e, "failed to parse Gemini SSE chunk");
                return None;
            }
        };

        if let Some(err) = chunk.error {
            return Some(Err(LLMError::Api {
                status: err.code.unwrap_or(500),
                detail: err.message,
            }));
        }

        let text = chunk.text();
        (!text.is_empty()).then(|| Ok(StreamEvent::Token(text)))
    }
}

impl<S> Stream for StreamParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            while let Some(line) = self.next_line() {
                if let Some(event) = Self::parse_line(&line) {
                    if event.is_err() {
                        self.done = true;
                    }
                    return Poll::Ready(Some(event));
                }
            }

            if self.eof {
                self.done = true;
                return Poll::Ready(Some(Ok(StreamEvent::Done)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(LLMError::Request(e))));
                }
                Poll::Ready(None) => {
                    self.eof = true;
                    // Terminate a trailing line so it still gets parsed.
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
