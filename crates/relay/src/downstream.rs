//! Reducer link
//!
//! Owns the TCP connection to the reducer and drains the chunks flushed by
//! collect sessions. Reconnects with exponential backoff; while the link is
//! down its state is reflected in the relay health (readiness drops) and
//! the bounded channel backpressures the sessions.

use relay_lib::health::RelayHealth;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct ReducerLink {
    endpoint: String,
    health: RelayHealth,
}

impl ReducerLink {
    pub fn new(endpoint: String, health: RelayHealth) -> Self {
        Self { endpoint, health }
    }

    /// Drains session chunks into the reducer connection until the channel
    /// closes. A chunk is retried across reconnects rather than dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<Vec<u8>>) {
        let mut conn: Option<TcpStream> = None;
        let mut backoff = INITIAL_BACKOFF;

        while let Some(chunk) = rx.recv().await {
            loop {
                if conn.is_none() {
                    conn = Some(self.connect(&mut backoff).await);
                }
                let Some(stream) = conn.as_mut() else {
                    continue;
                };

                match stream.write_all(&chunk).await {
                    Ok(()) => break,
                    Err(e) => {
                        warn!(
                            error = %e,
                            endpoint = %self.endpoint,
                            "reducer write failed, reconnecting"
                        );
                        self.health.downstream_reconnecting(e.to_string()).await;
                        conn = None;
                    }
                }
            }
        }

        info!("downstream channel closed, reducer link stopping");
    }

    async fn connect(&self, backoff: &mut Duration) -> TcpStream {
        loop {
            match TcpStream::connect(&self.endpoint).await {
                Ok(stream) => {
                    info!(endpoint = %self.endpoint, "connected to reducer");
                    self.health.downstream_connected().await;
                    *backoff = INITIAL_BACKOFF;
                    return stream;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        endpoint = %self.endpoint,
                        backoff_secs = backoff.as_secs(),
                        "reducer connect failed"
                    );
                    self.health.downstream_reconnecting(e.to_string()).await;
                    tokio::time::sleep(*backoff).await;
                    *backoff = (*backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}
