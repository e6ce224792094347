//! Livepoll - live polling session server
//!
//! One teacher runs timed multiple-choice polls for a room of students over
//! WebSockets.

use std::path::PathBuf;

use clap::Parser;
use livepoll_net::Server;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{AppConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "livepoll", version, about = "Live polling session server")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding config and `PORT`
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(config: &AppConfig) {
    // RUST_LOG wins over the configured directive
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn run(config: AppConfig) -> livepoll_net::Result<()> {
    let server = Server::start(config.server).await?;
    tracing::info!(addr = %server.addr(), "Livepoll listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.shutdown().await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = AppConfig::load(cli.config.as_deref());
    let fallback = AppConfig::default();
    init_tracing(loaded.as_ref().unwrap_or(&fallback));

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        origins = ?config.server.allowed_origins,
        "Starting Livepoll"
    );

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}
