//! Worker gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────┐
//!                    │                  WORKER GATEWAY                   │
//!                    │                                                   │
//!  GET /a.nc.dmr     │  ┌─────────┐    ┌────────────┐    ┌───────────┐   │
//!  ──────────────────┼─▶│  http   │───▶│  routing   │───▶│ load_bal. │   │
//!                    │  │ server  │    │ dispatcher │    │ ring/pool │   │
//!                    │  └─────────┘    └────────────┘    └─────┬─────┘   │
//!                    │                                         │         │
//!                    │                                         ▼         │
//!  200 + bytes       │  ┌─────────┐                     ┌───────────┐   │
//!  ◀─────────────────┼──│ forward │◀────────────────────│ protocol  │◀──┼── worker
//!                    │  └─────────┘                     │  session  │   │   (TCP)
//!                    │                                  └───────────┘   │
//!                    │  config · health · observability · lifecycle      │
//!                    └───────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use worker_gateway::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use worker_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use worker_gateway::observability::{logging, metrics};
use worker_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "worker-gateway", version, about = "HTTP gateway for chunked-protocol workers")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not reload the configuration file on change
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability.log_level)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "worker-gateway starting");

    if config.workers.is_empty() {
        return Err("no workers configured; pass --config".into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        workers = config.workers.len(),
        responders = config.responders.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (config_updates, _watcher) = match (&args.config, args.no_watch) {
        (Some(path), false) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        _ => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
