//! LLM error types.

use thiserror::Error;

/// Errors that can occur when calling a completion provider.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request failed
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response
    #[error("api error (status {status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    /// Upstream did not answer in time
    #[error("upstream request timed out")]
    Timeout,
}

/// Turn a non-success response into `LLMError::Api`, pulling a detail string
/// out of the body with `extract`.
pub(crate) async fn api_error(
    response: reqwest::Response,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> LLMError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| extract(&v));
    LLMError::Api { status, detail }
}

/// Render a JSON value as a detail string: strings verbatim, anything else compact.
pub(crate) fn detail_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
