//! Completion provider trait and provider kinds.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::LLMError;
use super::types::{ProviderRequest, Reply};

/// Trait for upstream completion providers.
///
/// A provider answers one call with either a buffered message or a live
/// stream of fragments. Implementations make exactly one upstream request
/// per call and never retry.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Forward a request upstream.
    async fn complete(&self, request: ProviderRequest) -> Result<Reply, LLMError>;
}

/// Which provider the relay is deployed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Custom REST chat API.
    #[default]
    Rest,
    /// Google Gemini streaming API.
    Gemini,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Rest => write!(f, "rest"),
            Provider::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Provider::Rest),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}
