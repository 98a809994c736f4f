//! Builds the one provider the relay is deployed with.

use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use super::gemini::GeminiProvider;
use super::provider::{CompletionProvider, Provider};
use super::rest::RestProvider;
use crate::config::{Config, ConfigError};

/// Construct the configured provider.
///
/// Selection happens once, at startup. Fails if the chosen provider is
/// missing required settings.
pub fn build_provider(
    config: &Config,
    client: Client,
) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    let timeout = config.relay.upstream_timeout();

    let provider: Arc<dyn CompletionProvider> = match config.relay.provider {
        Provider::Rest => {
            let provider = RestProvider::new(
                client,
                config.rest.base_url.clone(),
                config.rest.body_format,
                timeout,
            );
            info!(base_url = %provider.base_url(), "Using REST chat provider");
            Arc::new(provider)
        }
        Provider::Gemini => {
            let api_key = config.gemini.api_key.clone().ok_or_else(|| {
                ConfigError::Invalid("gemini provider selected but no API key configured".into())
            })?;
            info!(model = %config.gemini.model, "Using Gemini streaming provider");
            Arc::new(GeminiProvider::new(
                client,
                api_key,
                config.gemini.base_url.clone(),
                config.gemini.model.clone(),
                timeout,
            ))
        }
    };

    Ok(provider)
}
