//! Observability for the relay
//!
//! Provides:
//! - Prometheus metrics (session counts, event throughput, table sizes,
//!   dispatch latency)
//! - Structured JSON logging of session lifecycle events

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for event dispatch latency (in seconds). Dispatch is
/// CPU-only apart from buffer flushes, so the range skews small.
const DISPATCH_LATENCY_BUCKETS: &[f64] = &[
    0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RelayMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct RelayMetricsInner {
    sessions_started: IntGauge,
    sessions_active: IntGauge,
    resyncs: IntGauge,
    events_received: IntGauge,
    malformed_events: IntGauge,
    records_emitted: IntGauge,
    pods_live: IntGauge,
    pods_waiting: IntGauge,
    owners_tracked: IntGauge,
    owners_tombstoned: IntGauge,
    flush_failures: IntGauge,
    dispatch_latency_seconds: Histogram,
}

impl RelayMetricsInner {
    fn new() -> Self {
        Self {
            sessions_started: register_int_gauge!(
                "k8s_relay_sessions_started_total",
                "Collect sessions accepted since startup"
            )
            .expect("Failed to register sessions_started"),

            sessions_active: register_int_gauge!(
                "k8s_relay_sessions_active",
                "Collect sessions currently running"
            )
            .expect("Failed to register sessions_active"),

            resyncs: register_int_gauge!(
                "k8s_relay_resyncs_total",
                "Forced watcher resyncs triggered by waiting-set overflow"
            )
            .expect("Failed to register resyncs"),

            events_received: register_int_gauge!(
                "k8s_relay_events_received_total",
                "Watch events dispatched to the correlator"
            )
            .expect("Failed to register events_received"),

            malformed_events: register_int_gauge!(
                "k8s_relay_malformed_events_total",
                "Watch events dropped for a missing uid"
            )
            .expect("Failed to register malformed_events"),

            records_emitted: register_int_gauge!(
                "k8s_relay_records_emitted_total",
                "Pod lifecycle records written toward the reducer"
            )
            .expect("Failed to register records_emitted"),

            pods_live: register_int_gauge!(
                "k8s_relay_pods_live",
                "Pods announced downstream in the current sessions"
            )
            .expect("Failed to register pods_live"),

            pods_waiting: register_int_gauge!(
                "k8s_relay_pods_waiting",
                "Pods blocked on a yet-unseen ReplicaSet/Job"
            )
            .expect("Failed to register pods_waiting"),

            owners_tracked: register_int_gauge!(
                "k8s_relay_owners_tracked",
                "ReplicaSet/Job entries in the owner table"
            )
            .expect("Failed to register owners_tracked"),

            owners_tombstoned: register_int_gauge!(
                "k8s_relay_owners_tombstoned",
                "Deleted owners retained in the tombstone queue"
            )
            .expect("Failed to register owners_tombstoned"),

            flush_failures: register_int_gauge!(
                "k8s_relay_flush_failures_total",
                "Buffered writer flushes that failed"
            )
            .expect("Failed to register flush_failures"),

            dispatch_latency_seconds: register_histogram!(
                "k8s_relay_dispatch_latency_seconds",
                "Time spent dispatching one watch event",
                DISPATCH_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register dispatch_latency_seconds"),
        }
    }
}

/// Relay metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct RelayMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RelayMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RelayMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_sessions_started(&self) {
        self.inner().sessions_started.inc();
    }

    pub fn inc_sessions_active(&self) {
        self.inner().sessions_active.inc();
    }

    pub fn dec_sessions_active(&self) {
        self.inner().sessions_active.dec();
    }

    pub fn inc_resyncs(&self) {
        self.inner().resyncs.inc();
    }

    pub fn inc_events_received(&self) {
        self.inner().events_received.inc();
    }

    pub fn inc_malformed_events(&self) {
        self.inner().malformed_events.inc();
    }

    pub fn inc_records_emitted(&self) {
        self.inner().records_emitted.inc();
    }

    pub fn inc_flush_failures(&self) {
        self.inner().flush_failures.inc();
    }

    /// Record a dispatch latency observation
    pub fn observe_dispatch_latency(&self, duration_secs: f64) {
        self.inner().dispatch_latency_seconds.observe(duration_secs);
    }

    /// Update correlation table gauges
    pub fn set_correlation_sizes(
        &self,
        pods_live: i64,
        pods_waiting: i64,
        owners_tracked: i64,
        owners_tombstoned: i64,
    ) {
        self.inner().pods_live.set(pods_live);
        self.inner().pods_waiting.set(pods_waiting);
        self.inner().owners_tracked.set(owners_tracked);
        self.inner().owners_tombstoned.set(owners_tombstoned);
    }
}

/// Structured logger for session lifecycle events
///
/// Provides consistent JSON-formatted logging for session starts, forced
/// resyncs, and teardowns.
#[derive(Clone)]
pub struct SessionLogger {
    peer: String,
}

impl SessionLogger {
    pub fn new(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }

    /// Log a session start
    pub fn log_session_started(&self) {
        info!(
            event = "session_started",
            peer = %self.peer,
            "Collect session started"
        );
    }

    /// Log a session end with its reason and event count
    pub fn log_session_ended(&self, reason: &str, events_handled: u64) {
        info!(
            event = "session_ended",
            peer = %self.peer,
            reason = %reason,
            events_handled = events_handled,
            "Collect session ended"
        );
    }

    /// Log a forced resync
    pub fn log_resync(&self, waiting_pods: usize) {
        warn!(
            event = "resync_triggered",
            peer = %self.peer,
            waiting_pods = waiting_pods,
            "Waiting set overflowed, forcing watcher resync"
        );
    }

    /// Log a downstream writer failure
    pub fn log_writer_failure(&self, error: &str) {
        warn!(
            event = "writer_failed",
            peer = %self.peer,
            error = %error,
            "Downstream writer failed, ending session"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_metrics_creation() {
        // Note: metrics live in the process-global Prometheus registry, so
        // handles from different tests share one instance.
        let metrics = RelayMetrics::new();

        metrics.inc_sessions_started();
        metrics.inc_sessions_active();
        metrics.dec_sessions_active();
        metrics.inc_events_received();
        metrics.observe_dispatch_latency(0.0001);
        metrics.set_correlation_sizes(5, 1, 3, 0);
    }

    #[test]
    fn test_session_logger_creation() {
        let logger = SessionLogger::new("10.1.2.3:5000");
        assert_eq!(logger.peer, "10.1.2.3:5000");
    }
}
