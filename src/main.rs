//! manifold: multi-tenant HTTP routing and serving core.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                   MANIFOLD                    │
//!                      │                                               │
//!     Client Request   │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!     ─────────────────┼─▶│   net   │──▶│   http   │──▶│  domain   │  │
//!                      │  │ tls/SNI │   │ dispatch │   │ registry  │  │
//!                      │  └─────────┘   └──────────┘   └─────┬─────┘  │
//!                      │                                     │        │
//!                      │                                     ▼        │
//!                      │                              ┌───────────┐   │
//!                      │                              │  routing  │   │
//!                      │                              │  tables   │   │
//!                      │                              └─────┬─────┘   │
//!                      │                                     │        │
//!     Client Response  │  ┌──────────────────────────┐      ▼        │
//!     ◀────────────────┼──│     middleware chain     │◀─ handler     │
//!                      │  │ recovery/id/drain/limit  │               │
//!                      │  └──────────────────────────┘               │
//!                      │                                               │
//!                      │  ┌─────────────────────────────────────────┐ │
//!                      │  │           Cross-Cutting Concerns         │ │
//!                      │  │  ┌────────┐ ┌────────┐ ┌─────────────┐  │ │
//!                      │  │  │ config │ │ health │ │   metrics   │  │ │
//!                      │  │  └────────┘ └────────┘ └─────────────┘  │ │
//!                      │  │  ┌───────────────────────────────────┐  │ │
//!                      │  │  │      lifecycle (drain/shutdown)   │  │ │
//!                      │  │  └───────────────────────────────────┘  │ │
//!                      │  └─────────────────────────────────────────┘ │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifold::config::{load_config, ServerConfig};
use manifold::Server;

#[derive(Parser)]
#[command(name = "manifold")]
#[command(about = "Multi-tenant HTTP routing and serving core", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address (e.g. "0.0.0.0:8443").
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manifold=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.routing.mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let server = Server::from_config(config)?;
    for route in server.routes() {
        tracing::debug!(
            method = %route.method,
            path = %route.path,
            category = %route.category,
            "Route compiled"
        );
    }

    server.serve().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
