//! Bearer credentials and token verification.
//!
//! The relay never issues tokens. It accepts one from the client, optionally
//! checks it with a [`TokenVerifier`], and forwards it unchanged upstream.

mod identity;
mod verifier;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

pub use identity::IdentityToolkitVerifier;
pub use verifier::{AuthError, Principal, StaticTokenVerifier, TokenVerifier};

use crate::config::{AuthConfig, ConfigError, VerifierKind};

/// Build the configured verifier. `None` means tokens are trusted as-is.
///
/// `lookup_timeout` bounds remote verification calls.
pub fn build_verifier(
    config: &AuthConfig,
    client: Client,
    lookup_timeout: Duration,
) -> Result<Option<Arc<dyn TokenVerifier>>, ConfigError> {
    let verifier: Arc<dyn TokenVerifier> = match config.verifier {
        VerifierKind::None => {
            info!("Token verification disabled; forwarding tokens unverified");
            return Ok(None);
        }
        VerifierKind::Static => {
            if config.static_tokens.is_empty() {
                return Err(ConfigError::Invalid(
                    "auth.verifier is 'static' but auth.static_tokens is empty".into(),
                ));
            }
            info!(tokens = config.static_tokens.len(), "Using static token verifier");
            Arc::new(StaticTokenVerifier::new(config.static_tokens.clone()))
        }
        VerifierKind::IdentityToolkit => {
            let api_key = config.identity_api_key.clone().ok_or_else(|| {
                ConfigError::Invalid("auth.identity_api_key is not set".into())
            })?;
            info!("Using identity provider token verifier");
            Arc::new(IdentityToolkitVerifier::new(
                client,
                config.identity_base_url.clone(),
                api_key,
                lookup_timeout,
            ))
        }
    };
    Ok(Some(verifier))
}

/// An opaque bearer credential.
///
/// `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Build a token from a raw string, treating blank input as absent.
    /// A non-blank token is kept exactly as given.
    pub fn non_blank(token: &str) -> Option<Self> {
        (!token.trim().is_empty()).then(|| Self(token.to_string()))
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn from_header(value: &str) -> Option<Self> {
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Self::non_blank(token.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an outbound `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}
