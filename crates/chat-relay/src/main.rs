use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::config::Config;
use chat_relay::server::{self, AppState};

#[derive(Parser)]
#[command(name = "chat-relay", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve {
        /// Path to the YAML config file. A missing file means defaults.
        #[arg(short, long, default_value = "chat-relay.yaml")]
        config: PathBuf,
        /// Override the listen host.
        #[arg(long)]
        host: Option<String>,
        /// Override the listen port.
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config, host, port } => serve(config, host, port).await,
    }
}

async fn serve(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.apply_env()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let state = AppState::from_config(&config)?;
    let app = server::build_app(state, config.server.request_timeout_seconds);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, provider = %config.relay.provider, "chat-relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    Ok(())
}
