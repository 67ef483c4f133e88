//! Integration tests for the relay API endpoints
//!
//! Exercises the relay's probe semantics: liveness stays green through a
//! reducer outage, readiness gates on startup and on the reducer link.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use relay_lib::health::RelayHealth;
use relay_lib::observability::RelayMetrics;
use tower::ServiceExt;

async fn healthz(State(health): State<RelayHealth>) -> impl IntoResponse {
    (StatusCode::OK, Json(health.health().await))
}

async fn readyz(State(health): State<RelayHealth>) -> impl IntoResponse {
    let readiness = health.readiness().await;
    if readiness.ready {
        (StatusCode::OK, Json(readiness))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(readiness))
    }
}

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

fn create_test_router(health: RelayHealth) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(health)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_is_ok_with_idle_link() {
    let health = RelayHealth::new();
    let app = create_test_router(health);

    let (status, body) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["downstream"]["state"], "idle");
}

#[tokio::test]
async fn test_healthz_stays_alive_through_reducer_outage() {
    let health = RelayHealth::new();
    health.set_started().await;
    health.downstream_reconnecting("connection refused").await;

    let app = create_test_router(health);
    let (status, body) = get_json(app, "/healthz").await;

    // Degraded, but still 200: restarting the relay would only force every
    // watcher through a resync
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["downstream"]["state"], "reconnecting");
    assert_eq!(body["downstream"]["attempts"], 1);
    assert_eq!(body["downstream"]["last_error"], "connection refused");
}

#[tokio::test]
async fn test_readyz_gates_on_startup() {
    let health = RelayHealth::new();
    let app = create_test_router(health.clone());

    let (status, body) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "relay still starting");

    health.set_started().await;

    let (status, body) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_readyz_drops_while_reducer_link_is_down() {
    let health = RelayHealth::new();
    health.set_started().await;
    let app = create_test_router(health.clone());

    health.downstream_reconnecting("connection refused").await;
    health.downstream_reconnecting("connection refused").await;

    let (status, body) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert_eq!(
        body["reason"],
        "reducer link down after 2 reconnect attempts"
    );

    // Readiness recovers as soon as the link is back
    health.downstream_connected().await;
    let (status, body) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_exposes_relay_series() {
    let metrics = RelayMetrics::new();
    metrics.inc_sessions_started();
    metrics.inc_flush_failures();

    let app = create_test_router(RelayHealth::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    // The whole relay series is registered up front, not just the counters
    // touched so far
    assert!(text.contains("k8s_relay_sessions_started_total 1"));
    assert!(text.contains("k8s_relay_flush_failures_total 1"));
    assert!(text.contains("k8s_relay_resyncs_total"));
    assert!(text.contains("k8s_relay_pods_waiting"));
    assert!(text.contains("k8s_relay_dispatch_latency_seconds"));
}
