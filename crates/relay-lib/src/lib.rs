//! Kubernetes metadata correlation and relay core
//!
//! This crate implements the relay side of the k8s metadata pipeline:
//! - Wire types and gRPC glue for the watcher collect stream
//! - Per-session correlation of pods to their effective workload owners
//! - Typed record emission to the reducer over a resync-capable channel
//! - Health checks and observability

pub mod correlate;
pub mod health;
pub mod ingest;
pub mod kind;
pub mod observability;
pub mod proto;
pub mod resync;
pub mod service;
pub mod session;

pub use correlate::{CorrelationLimits, CorrelationStats, Correlator};
pub use kind::OwnerKind;
pub use observability::{RelayMetrics, SessionLogger};
pub use service::MetadataRelay;
pub use session::{run_session, SessionConfig, SessionEnd};
