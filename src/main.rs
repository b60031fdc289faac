//! Service Proxy
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 SERVICE PROXY                  │
//!     Application       │  ┌─────────┐   ┌──────────────┐               │
//!     ──────────────────┼─▶│  http   │──▶│  api routes  │──▶ store      │
//!                       │  │ server  │   │ (token check)│──▶ platform   │
//!                       │  └────┬────┘   └──────────────┘               │
//!                       │       │ fallback                               │
//!                       │       ▼                                        │
//!                       │  ┌─────────┐   ┌──────────────┐               │     External
//!                       │  │ forward │──▶│   upstream   │───────────────┼───▶ Service
//!                       │  └─────────┘   └──────────────┘               │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use service_proxy::config::{load_config, validate_config, ProxyConfig};
use service_proxy::observability::{init_logging, init_metrics};
use service_proxy::{AppState, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "service-proxy")]
#[command(about = "Proxy between an application runtime and an external service", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the external service base URI
    #[arg(long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(upstream) = cli.upstream {
        config.upstream.base_uri = Some(upstream);
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("configuration error: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability);
    tracing::info!("service-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service_uri = config.upstream.base_uri().unwrap_or("-"),
        service_token = %config.upstream.masked_token(),
        "Configured proxy service"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = AppState::from_config(config)?;
    HttpServer::new(state).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
