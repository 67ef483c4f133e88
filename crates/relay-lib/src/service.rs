//! gRPC service for the watcher collect stream
//!
//! One `Collect` call serves one watcher session. The session runs in its
//! own task and owns all of its state; the response stream carries at most
//! one message (the "stop and re-list" notification during a resync) and
//! always terminates with CANCELLED.

use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::{wrappers::ReceiverStream, Stream};
use tonic::{Request, Response, Status, Streaming};
use tracing::info;

use crate::observability::{RelayMetrics, SessionLogger};
use crate::proto::metadata_collector_server::MetadataCollector;
use crate::proto::{CollectResponse, Info};
use crate::resync::{ResetCallback, ResyncChannelFactory};
use crate::session::{run_session, SessionConfig};

/// The metadata relay service.
///
/// Sessions are independent: each gets its own correlation state, buffered
/// writer and resync channel from the factory.
pub struct MetadataRelay {
    factory: Arc<dyn ResyncChannelFactory>,
    config: SessionConfig,
    metrics: RelayMetrics,
}

impl MetadataRelay {
    pub fn new(
        factory: Arc<dyn ResyncChannelFactory>,
        config: SessionConfig,
        metrics: RelayMetrics,
    ) -> Self {
        Self {
            factory,
            config,
            metrics,
        }
    }
}

#[tonic::async_trait]
impl MetadataCollector for MetadataRelay {
    type CollectStream = Pin<Box<dyn Stream<Item = Result<CollectResponse, Status>> + Send>>;

    async fn collect(
        &self,
        request: Request<Streaming<Info>>,
    ) -> Result<Response<Self::CollectStream>, Status> {
        let peer = request
            .remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let inbound = request.into_inner();

        let (out_tx, out_rx) = mpsc::channel::<Result<CollectResponse, Status>>(4);
        let (reset_tx, reset_rx) = broadcast::channel(1);

        // The reset hook notifies the watcher with a final response, then
        // cancels the server side so the read loop returns immediately.
        let reset: ResetCallback = {
            let out_tx = out_tx.clone();
            Box::new(move || {
                info!("notifying watcher to stop");
                let _ = out_tx.try_send(Ok(CollectResponse::default()));
                let _ = reset_tx.send(());
            })
        };

        let channel = self.factory.new_channel(reset);
        let config = self.config.clone();
        let metrics = self.metrics.clone();
        let logger = SessionLogger::new(peer);

        tokio::spawn(async move {
            metrics.inc_sessions_started();
            metrics.inc_sessions_active();
            logger.log_session_started();

            let _ = run_session(
                inbound,
                channel,
                &config,
                metrics.clone(),
                logger,
                reset_rx,
            )
            .await;

            // The reducer treats clean termination as anomalous, so every
            // session ends as cancelled.
            let _ = out_tx
                .send(Err(Status::cancelled("collect stream closed")))
                .await;
            metrics.dec_sessions_active();
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(out_rx)) as Self::CollectStream
        ))
    }
}
