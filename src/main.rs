//! Gatekeeper server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper::config::loader::load_config;
use gatekeeper::config::watcher::ConfigWatcher;
use gatekeeper::config::GatewayConfig;
use gatekeeper::gateway::Gateway;
use gatekeeper::http::GatewayServer;
use gatekeeper::observability::metrics;
use gatekeeper::session::auth::{InMemoryCounter, InMemoryDirectory};

#[derive(Parser)]
#[command(name = "gatekeeper", about = "Request-security gateway", version)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply without one.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("gatekeeper v0.1.0 starting");

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        session_lifetime_secs = config.session.lifetime_secs,
        rate_limit_enabled = config.rate_limit.enabled,
        seeded_principals = config.auth.principals.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let directory = Arc::new(InMemoryDirectory::from_seeds(&config.auth.principals));
    let counters = Arc::new(InMemoryCounter::new());
    let gateway = Arc::new(Gateway::new(config.clone(), directory, counters.clone())?);

    // Hot reload: the watcher re-validates edits and the gateway swaps
    // atomically; a broken edit keeps the running configuration.
    let mut _watcher_guard = None;
    if let Some(path) = &args.config {
        let (watcher, mut updates) = ConfigWatcher::new(path);
        _watcher_guard = Some(watcher.run()?);
        let gateway = gateway.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                gateway.swap_config(new_config);
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let server = GatewayServer::new(gateway, counters);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
