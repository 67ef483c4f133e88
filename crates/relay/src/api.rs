//! HTTP API for health checks and Prometheus metrics
//!
//! Probe semantics are the relay's own: liveness stays green through a
//! reducer outage (restarting the relay would force every watcher through
//! a full resync), while readiness drops until the reducer link is usable
//! again so new watcher streams are held off.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use relay_lib::health::RelayHealth;
use tracing::{debug, info};

/// Liveness probe. Always 200 while the process is up; the body carries
/// the reducer link state for operators.
async fn healthz(State(health): State<RelayHealth>) -> impl IntoResponse {
    (StatusCode::OK, Json(health.health().await))
}

/// Readiness probe. 503 until startup completes, and again whenever the
/// reducer link is down: records produced by a new session could not be
/// delivered anyway.
async fn readyz(State(health): State<RelayHealth>) -> impl IntoResponse {
    let readiness = health.readiness().await;

    if readiness.ready {
        (StatusCode::OK, Json(readiness))
    } else {
        debug!(
            reason = readiness.reason.as_deref().unwrap_or(""),
            "readiness probe rejected"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(readiness))
    }
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(health: RelayHealth) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(health)
}

/// Start the API server
pub async fn serve(port: u16, health: RelayHealth) -> anyhow::Result<()> {
    let app = create_router(health);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
