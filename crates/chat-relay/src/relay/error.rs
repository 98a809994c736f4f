//! Relay failure taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::llm::LLMError;
use crate::response;

pub const NO_TOKEN_MESSAGE: &str = "No authentication token provided";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid authentication token";
pub const UPSTREAM_FALLBACK_MESSAGE: &str = "Failed to get response from API";
pub const UNKNOWN_MESSAGE: &str = "An unknown error occurred";

/// Why a relay call failed. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Body missing or not the expected JSON shape.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// No message with role `user` in the conversation.
    #[error("no user message found")]
    MissingUserMessage,

    /// Credential absent or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// The upstream answered with a failure, or could not be reached.
    #[error("upstream error (status {status:?}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Upstream {
        status: Option<u16>,
        detail: Option<String>,
    },

    /// Anything else.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MalformedRequest(_) | RelayError::MissingUserMessage => {
                StatusCode::BAD_REQUEST
            }
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            RelayError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `error` field sent to the client.
    pub fn client_message(&self) -> String {
        match self {
            RelayError::MalformedRequest(reason) => format!("Malformed request body: {reason}"),
            RelayError::MissingUserMessage => "No user message found".to_string(),
            RelayError::Unauthorized(message) => (*message).to_string(),
            RelayError::Upstream { detail, .. } => detail
                .clone()
                .unwrap_or_else(|| UPSTREAM_FALLBACK_MESSAGE.to_string()),
            RelayError::Unknown(_) => UNKNOWN_MESSAGE.to_string(),
        }
    }
}

impl From<LLMError> for RelayError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Api { status, detail } => RelayError::Upstream {
                status: Some(status),
                detail,
            },
            LLMError::Timeout => RelayError::Upstream {
                status: Some(StatusCode::GATEWAY_TIMEOUT.as_u16()),
                detail: Some("upstream request timed out".to_string()),
            },
            LLMError::Request(e) => {
                error!(error = %e, "upstream request failed");
                RelayError::Upstream {
                    status: None,
                    detail: None,
                }
            }
        }
    }
}

impl From<AuthError> for RelayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(_) => RelayError::Unauthorized(INVALID_TOKEN_MESSAGE),
            AuthError::Unavailable(reason) => RelayError::Unknown(reason),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if let RelayError::Unknown(ref cause) = self {
            error!(cause = %cause, "chat relay failed");
        }
        response::error(self.status_code(), self.client_message()).into_response()
    }
}
