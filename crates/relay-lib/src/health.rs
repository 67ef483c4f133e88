//! Health reporting for the relay
//!
//! The relay itself has no moving parts that can fail while the process is
//! up; what actually degrades in production is the reducer link. The link
//! reports its state transitions here and the HTTP probes render them:
//! - liveness stays green through a reducer outage, because restarting the
//!   relay would only force every watcher through a full resync
//! - readiness drops while the link is down, so new watcher streams are
//!   held off until their records can actually be delivered

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State of the downstream reducer link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum LinkState {
    /// No session has produced a chunk yet; the link dials lazily.
    #[default]
    Idle,
    /// Connected and draining session chunks.
    Connected { since: i64 },
    /// Dial or write failed; retrying with backoff.
    Reconnecting { attempts: u32, last_error: String },
}

/// Overall relay status reported by the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Ok,
    Degraded,
}

/// Liveness payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: RelayStatus,
    pub downstream: LinkState,
}

/// Readiness payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared health state, written by the reducer link and read by the probes.
#[derive(Debug, Clone, Default)]
pub struct RelayHealth {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    started: bool,
    downstream: LinkState,
}

impl RelayHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks startup complete. Readiness stays false until this is called.
    pub async fn set_started(&self) {
        self.inner.write().await.started = true;
    }

    /// Records a successful reducer dial.
    pub async fn downstream_connected(&self) {
        let mut inner = self.inner.write().await;
        inner.downstream = LinkState::Connected {
            since: Utc::now().timestamp(),
        };
    }

    /// Records a failed reducer dial or write. Attempts accumulate until
    /// the next successful dial.
    pub async fn downstream_reconnecting(&self, error: impl Into<String>) {
        let mut inner = self.inner.write().await;
        let attempts = match &inner.downstream {
            LinkState::Reconnecting { attempts, .. } => attempts + 1,
            _ => 1,
        };
        inner.downstream = LinkState::Reconnecting {
            attempts,
            last_error: error.into(),
        };
    }

    pub async fn health(&self) -> HealthReport {
        let inner = self.inner.read().await;
        let status = match inner.downstream {
            LinkState::Reconnecting { .. } => RelayStatus::Degraded,
            _ => RelayStatus::Ok,
        };
        HealthReport {
            status,
            downstream: inner.downstream.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessReport {
        let inner = self.inner.read().await;
        if !inner.started {
            return ReadinessReport {
                ready: false,
                reason: Some("relay still starting".to_string()),
            };
        }

        match &inner.downstream {
            LinkState::Reconnecting { attempts, .. } => ReadinessReport {
                ready: false,
                reason: Some(format!(
                    "reducer link down after {} reconnect attempts",
                    attempts
                )),
            },
            _ => ReadinessReport {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_ready_until_started() {
        let health = RelayHealth::new();

        let readiness = health.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("relay still starting"));

        health.set_started().await;
        assert!(health.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_reducer_outage_degrades_but_does_not_kill() {
        let health = RelayHealth::new();
        health.set_started().await;

        health.downstream_reconnecting("connection refused").await;

        // Liveness only degrades; readiness actually drops
        let report = health.health().await;
        assert_eq!(report.status, RelayStatus::Degraded);
        let readiness = health.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().contains("1 reconnect attempts"));
    }

    #[tokio::test]
    async fn test_reconnect_attempts_accumulate_and_reset() {
        let health = RelayHealth::new();

        health.downstream_reconnecting("refused").await;
        health.downstream_reconnecting("refused").await;
        health.downstream_reconnecting("timed out").await;

        match health.health().await.downstream {
            LinkState::Reconnecting {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "timed out");
            }
            other => panic!("unexpected link state {:?}", other),
        }

        // A successful dial resets the counter
        health.downstream_connected().await;
        assert!(matches!(
            health.health().await.downstream,
            LinkState::Connected { .. }
        ));

        health.downstream_reconnecting("refused").await;
        match health.health().await.downstream {
            LinkState::Reconnecting { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected link state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_idle_link_is_ok_and_ready() {
        let health = RelayHealth::new();
        health.set_started().await;

        // The link dials lazily; an idle link must not block readiness
        let report = health.health().await;
        assert_eq!(report.status, RelayStatus::Ok);
        assert_eq!(report.downstream, LinkState::Idle);
        assert!(health.readiness().await.ready);
    }

    #[test]
    fn test_link_state_wire_shape() {
        let idle = serde_json::to_value(LinkState::Idle).unwrap();
        assert_eq!(idle["state"], "idle");

        let reconnecting = serde_json::to_value(LinkState::Reconnecting {
            attempts: 2,
            last_error: "refused".to_string(),
        })
        .unwrap();
        assert_eq!(reconnecting["state"], "reconnecting");
        assert_eq!(reconnecting["attempts"], 2);
        assert_eq!(reconnecting["last_error"], "refused");
    }
}
