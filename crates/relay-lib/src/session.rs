//! Collect session loop
//!
//! One session per watcher stream: reads events, dispatches them to the
//! correlator, flushes the buffered writer after every event, and forces a
//! resync when the waiting set overflows. The stream is never allowed to
//! terminate cleanly; every exit path is surfaced to the watcher as
//! CANCELLED.

use anyhow::Result;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::correlate::{CorrelationLimits, Correlator};
use crate::ingest::{wall_clock, BufferedWriter, IngestWriter, DEFAULT_COLLECT_BUFFER_SIZE};
use crate::observability::{RelayMetrics, SessionLogger};
use crate::proto::{Info, InfoEvent, InfoType};
use crate::resync::ResyncChannel;

/// Per-session tunables supplied by the enclosing server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Byte budget of the buffered frame writer.
    pub collect_buffer_size: usize,
    pub limits: CorrelationLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collect_buffer_size: DEFAULT_COLLECT_BUFFER_SIZE,
            limits: CorrelationLimits::default(),
        }
    }
}

/// How a session came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The watcher closed or broke the stream.
    Drained,
    /// The waiting set overflowed and the watcher was told to re-list.
    Resync,
    /// An external reset tore the session down.
    Shutdown,
}

impl SessionEnd {
    fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::Drained => "drained",
            SessionEnd::Resync => "resync",
            SessionEnd::Shutdown => "shutdown",
        }
    }
}

/// Runs one collect session to completion.
///
/// Suspends only on the event stream and on writer flushes; the correlator
/// itself is CPU-only. Residual buffered bytes are discarded on every exit
/// path so a torn-down session never leaks a partial emission downstream.
pub async fn run_session<S>(
    mut events: S,
    channel: ResyncChannel,
    config: &SessionConfig,
    metrics: RelayMetrics,
    logger: SessionLogger,
    shutdown: broadcast::Receiver<()>,
) -> Result<SessionEnd>
where
    S: Stream<Item = Result<Info, tonic::Status>> + Unpin,
{
    let buffered = BufferedWriter::new(channel, config.collect_buffer_size);
    let writer = IngestWriter::new(buffered, wall_clock());
    let mut correlator = Correlator::new(writer, config.limits.clone(), metrics.clone());

    let mut events_handled = 0u64;
    let result = session_loop(
        &mut events,
        &mut correlator,
        &metrics,
        &logger,
        shutdown,
        &mut events_handled,
    )
    .await;

    // Drop anything still buffered; flushes are event-granular and a
    // partial emission must not reach the reducer.
    correlator.discard();

    match &result {
        Ok(end) => logger.log_session_ended(end.as_str(), events_handled),
        Err(e) => logger.log_writer_failure(&e.to_string()),
    }
    result
}

async fn session_loop<S>(
    events: &mut S,
    correlator: &mut Correlator,
    metrics: &RelayMetrics,
    logger: &SessionLogger,
    mut shutdown: broadcast::Receiver<()>,
    events_handled: &mut u64,
) -> Result<SessionEnd>
where
    S: Stream<Item = Result<Info, tonic::Status>> + Unpin,
{
    loop {
        let info = tokio::select! {
            _ = shutdown.recv() => return Ok(SessionEnd::Shutdown),
            next = events.next() => match next {
                Some(Ok(info)) => info,
                Some(Err(status)) => {
                    debug!(code = ?status.code(), "watcher stream error");
                    return Ok(SessionEnd::Drained);
                }
                None => return Ok(SessionEnd::Drained),
            },
        };

        let start = Instant::now();
        dispatch(correlator, info).await?;
        *events_handled += 1;
        metrics.inc_events_received();
        metrics.observe_dispatch_latency(start.elapsed().as_secs_f64());

        let stats = correlator.stats();
        metrics.set_correlation_sizes(
            stats.pods_live as i64,
            stats.pods_waiting as i64,
            stats.owners_tracked as i64,
            stats.owners_tombstoned as i64,
        );

        if correlator.need_restart() {
            logger.log_resync(stats.pods_waiting);
            metrics.inc_resyncs();
            correlator.reset();
            return Ok(SessionEnd::Resync);
        }

        // Flush after every event; the buffered writer only ever coalesces
        // the records of a single logical event.
        if let Err(e) = correlator.flush().await {
            metrics.inc_flush_failures();
            return Err(e);
        }
    }
}

async fn dispatch(correlator: &mut Correlator, info: Info) -> Result<()> {
    let Some(info_type) = InfoType::from_i32(info.r#type) else {
        debug!(info_type = info.r#type, "ignoring info with unknown type");
        return Ok(());
    };
    let Some(event) = InfoEvent::from_i32(info.event) else {
        debug!(event = info.event, "ignoring info with unknown event");
        return Ok(());
    };

    match info_type {
        InfoType::K8sPod => {
            let pod_info = info.pod_info.unwrap_or_default();
            match event {
                InfoEvent::Added | InfoEvent::Modified => {
                    correlator.pod_new_or_modified(pod_info).await?
                }
                InfoEvent::Deleted => correlator.pod_deleted(pod_info).await?,
                InfoEvent::Error => debug!("ignoring pod error event"),
            }
        }
        InfoType::K8sReplicaSet => {
            let rs_info = info.rs_info.unwrap_or_default();
            match event {
                InfoEvent::Added | InfoEvent::Modified => {
                    correlator.replica_set_new_or_modified(rs_info).await?
                }
                InfoEvent::Deleted => correlator.replica_set_deleted(&rs_info),
                InfoEvent::Error => debug!("ignoring replica set error event"),
            }
        }
        InfoType::K8sJob => {
            let job_info = info.job_info.unwrap_or_default();
            match event {
                InfoEvent::Added | InfoEvent::Modified => {
                    correlator.job_new_or_modified(job_info).await?
                }
                InfoEvent::Deleted => correlator.job_deleted(&job_info),
                InfoEvent::Error => debug!("ignoring job error event"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::{capture_channel_with_reset, decode_records, Record};
    use crate::proto::{ContainerInfo, OwnerInfo, PodInfo, ReplicaSetInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pod_event(event: InfoEvent, uid: &str, ip: &str, owner: Option<OwnerInfo>) -> Info {
        Info {
            r#type: InfoType::K8sPod as i32,
            event: event as i32,
            pod_info: Some(PodInfo {
                uid: uid.to_string(),
                ip: ip.to_string(),
                name: format!("pod-{}", uid),
                ns: "default".to_string(),
                version: "1".to_string(),
                is_host_network: false,
                owner,
                container_infos: vec![ContainerInfo {
                    id: format!("c-{}", uid),
                    name: "app".to_string(),
                    image: "img:1".to_string(),
                }],
            }),
            rs_info: None,
            job_info: None,
        }
    }

    fn rs_event(event: InfoEvent, uid: &str, owner: Option<OwnerInfo>) -> Info {
        Info {
            r#type: InfoType::K8sReplicaSet as i32,
            event: event as i32,
            pod_info: None,
            rs_info: Some(ReplicaSetInfo {
                uid: uid.to_string(),
                owner,
            }),
            job_info: None,
        }
    }

    fn stream_of(infos: Vec<Info>) -> impl Stream<Item = Result<Info, tonic::Status>> + Unpin {
        tokio_stream::iter(infos.into_iter().map(Ok))
    }

    async fn run(
        infos: Vec<Info>,
        config: &SessionConfig,
    ) -> (SessionEnd, Vec<Vec<u8>>, usize) {
        let resets = Arc::new(AtomicUsize::new(0));
        let reset_count = Arc::clone(&resets);
        let (channel, sink) = capture_channel_with_reset(Box::new(move || {
            reset_count.fetch_add(1, Ordering::SeqCst);
        }));

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let end = run_session(
            stream_of(infos),
            channel,
            config,
            RelayMetrics::new(),
            SessionLogger::new("test"),
            shutdown_rx,
        )
        .await
        .unwrap();

        (end, sink.chunks(), resets.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_drained_stream_ends_session() {
        let config = SessionConfig::default();
        let (end, chunks, resets) = run(
            vec![pod_event(InfoEvent::Added, "p1", "10.0.0.1", None)],
            &config,
        )
        .await;

        assert_eq!(end, SessionEnd::Drained);
        assert_eq!(chunks.len(), 1);
        assert_eq!(resets, 0);
    }

    #[tokio::test]
    async fn test_one_chunk_per_event() {
        let config = SessionConfig::default();
        let (_, chunks, _) = run(
            vec![
                pod_event(InfoEvent::Added, "p1", "10.0.0.1", None),
                pod_event(InfoEvent::Added, "p2", "10.0.0.2", None),
                pod_event(InfoEvent::Deleted, "p1", "", None),
            ],
            &config,
        )
        .await;

        // One flush per event; each chunk holds that event's records only
        assert_eq!(chunks.len(), 3);
        let first = decode_records(&chunks[0]);
        assert_eq!(first.len(), 2);
        assert!(matches!(first[0], Record::PodNew { .. }));
        assert!(matches!(first[1], Record::PodContainer { .. }));
        let third = decode_records(&chunks[2]);
        assert!(matches!(third[0], Record::PodDelete { .. }));
    }

    #[tokio::test]
    async fn test_events_emitting_nothing_send_no_chunk() {
        let config = SessionConfig::default();
        let (_, chunks, _) = run(
            vec![rs_event(
                InfoEvent::Added,
                "rs1",
                Some(OwnerInfo {
                    uid: "d1".to_string(),
                    name: "web".to_string(),
                    kind: "Deployment".to_string(),
                }),
            )],
            &config,
        )
        .await;

        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_overflow_triggers_one_reset() {
        let config = SessionConfig {
            collect_buffer_size: 1024,
            limits: CorrelationLimits {
                max_waiting_pods: 50,
                max_deleted_owners: 10_000,
            },
        };

        let mut infos = Vec::new();
        for i in 0..51 {
            infos.push(pod_event(
                InfoEvent::Added,
                &format!("p{}", i),
                "10.0.0.1",
                Some(OwnerInfo {
                    uid: format!("rs{}", i),
                    name: String::new(),
                    kind: "ReplicaSet".to_string(),
                }),
            ));
        }

        let (end, chunks, resets) = run(infos, &config).await;

        assert_eq!(end, SessionEnd::Resync);
        assert_eq!(resets, 1);
        // Every pod was waiting; nothing was ever emitted
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_and_type_are_ignored() {
        let config = SessionConfig::default();
        let mut bogus_event = pod_event(InfoEvent::Added, "p1", "10.0.0.1", None);
        bogus_event.event = 17;
        let mut bogus_type = pod_event(InfoEvent::Added, "p2", "10.0.0.2", None);
        bogus_type.r#type = 9;
        let error_event = Info {
            r#type: InfoType::K8sPod as i32,
            event: InfoEvent::Error as i32,
            pod_info: None,
            rs_info: None,
            job_info: None,
        };

        let (end, chunks, _) = run(vec![bogus_event, bogus_type, error_event], &config).await;

        assert_eq!(end, SessionEnd::Drained);
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_external_shutdown_ends_session() {
        let (channel, _sink) = capture_channel_with_reset(Box::new(|| {}));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        // A stream that never yields, so only the shutdown can end the loop
        let pending = tokio_stream::pending::<Result<Info, tonic::Status>>();
        let config = SessionConfig::default();

        let end = run_session(
            pending,
            channel,
            &config,
            RelayMetrics::new(),
            SessionLogger::new("test"),
            shutdown_rx,
        )
        .await
        .unwrap();

        assert_eq!(end, SessionEnd::Shutdown);
    }
}
