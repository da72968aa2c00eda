//! ws-gateway
//!
//! ```text
//!                          ┌───────────────────────────────────────────────┐
//!   Client (HTTP / WS)     │                  GATEWAY                      │
//!   ──────────────────────▶│  server ─▶ waf ─▶ routing ─▶ pool.select      │
//!                          │                                  │            │
//!                          │                  ┌───────────────┴─────────┐  │
//!                          │                  ▼                         ▼  │
//!                          │            bridge (HTTP)        websocket     │
//!                          │                  │           tunnel/emulate  │
//!                          │                  └─────────────┬───────────┘  │     Backend
//!                          │                                └──────────────┼───▶ servers
//!                          │   failures ─▶ pool.increase_fails ─▶ notifier │
//!                          └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ws_gateway::config::loader::load_config;
use ws_gateway::config::watcher::ConfigWatcher;
use ws_gateway::net::tls::install_crypto_provider;
use ws_gateway::observability::{logging, metrics};
use ws_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "ws-gateway")]
#[command(about = "Reverse proxy with WebSocket bridging and WAF checkpoints", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Do not reload the configuration when the file changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    if cli.check {
        println!("{}: configuration ok", cli.config.display());
        return Ok(());
    }

    logging::init_logging(&config.observability);
    install_crypto_provider();

    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        backends = config.backends.len(),
        "ws-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = if cli.no_watch {
        let (_tx, rx) = mpsc::unbounded_channel();
        (None, rx)
    } else {
        let (watcher, rx) = ConfigWatcher::new(&cli.config);
        (Some(watcher.run()?), rx)
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown.trigger_on_signal().await }
    });

    HttpServer::new(config).run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
