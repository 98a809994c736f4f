use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use reqwest::Client;
use tower_http::timeout::TimeoutLayer;

use crate::auth::build_verifier;
use crate::config::{Config, ConfigError, Framing};
use crate::handlers;
use crate::llm::build_provider;
use crate::relay::ChatRelay;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    pub framing: Framing,
    pub idle_timeout: Duration,
    pub keep_alive_interval: Duration,
}

impl AppState {
    /// Wire up the provider, verifier and relay described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        let provider = build_provider(config, client.clone())?;
        let mut relay = ChatRelay::new(provider).require_auth(config.auth.required);
        let lookup_timeout = config.relay.upstream_timeout();
        if let Some(verifier) = build_verifier(&config.auth, client, lookup_timeout)? {
            relay = relay.with_verifier(verifier);
        }

        Ok(Self::new(relay, config))
    }

    /// State around an already-built relay.
    pub fn new(relay: ChatRelay, config: &Config) -> Self {
        Self {
            relay: Arc::new(relay),
            framing: config.streaming.framing,
            idle_timeout: Duration::from_secs(config.streaming.idle_timeout_seconds),
            keep_alive_interval: Duration::from_secs(config.server.keep_alive_interval_seconds),
        }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64) -> Router {
    let api = Router::new().route("/chat", post(handlers::chat));

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .nest("/api", api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
        .with_state(state)
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
