//! Kubernetes metadata relay daemon
//!
//! Accepts collect streams from k8s watchers, correlates pods to their
//! effective workload owners, and relays pod lifecycle records to the
//! reducer.

use anyhow::Result;
use relay_lib::health::RelayHealth;
use relay_lib::observability::RelayMetrics;
use relay_lib::proto::MetadataCollectorServer;
use relay_lib::resync::DownstreamFactory;
use relay_lib::MetadataRelay;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod downstream;

const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Chunks in flight toward the reducer before sessions start backpressuring.
const DOWNSTREAM_QUEUE_DEPTH: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = RELAY_VERSION, "Starting k8s-relay");

    // Load configuration
    let config = config::RelayConfig::load()?;
    info!(reducer = %config.reducer_endpoint, "Relay configured");

    // Initialize health state and metrics
    let health = RelayHealth::new();
    let metrics = RelayMetrics::new();

    // Start the reducer link
    let (chunk_tx, chunk_rx) = mpsc::channel(DOWNSTREAM_QUEUE_DEPTH);
    let link = downstream::ReducerLink::new(config.reducer_endpoint.clone(), health.clone());
    tokio::spawn(link.run(chunk_rx));

    // Wire the collect service to the reducer link
    let factory = Arc::new(DownstreamFactory::new(chunk_tx));
    let relay = MetadataRelay::new(factory, config.session_config(), metrics);

    // Start health and metrics server
    tokio::spawn(api::serve(config.api_port, health.clone()));

    // Mark the relay as ready to accept watcher streams
    health.set_started().await;

    let addr = format!("0.0.0.0:{}", config.listen_port).parse()?;
    info!(%addr, "Serving watcher collect streams");

    tonic::transport::Server::builder()
        .add_service(MetadataCollectorServer::new(relay))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down");
    Ok(())
}
