//! Resync channel to the reducer
//!
//! Each collect session writes its records into a [`ResyncChannel`]: a byte
//! sink toward the reducer plus a reset hook. Triggering the reset tells
//! the watcher peer to disconnect and re-list everything from a consistent
//! snapshot, instead of the relay simply vanishing mid-stream.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Downstream transport seam. In the daemon this is a channel feeding the
/// reducer link; tests substitute capturing sinks.
#[async_trait]
pub trait ByteSink: Send {
    async fn send(&mut self, chunk: &[u8]) -> Result<()>;
}

/// Invoked when a session must be torn down for a full resync: notifies the
/// watcher with a final response and cancels the server side of the stream.
pub type ResetCallback = Box<dyn Fn() + Send + Sync>;

/// Byte channel for one collect session.
pub struct ResyncChannel {
    sink: Box<dyn ByteSink>,
    reset: ResetCallback,
}

impl ResyncChannel {
    pub fn new(sink: Box<dyn ByteSink>, reset: ResetCallback) -> Self {
        Self { sink, reset }
    }

    pub async fn send(&mut self, chunk: &[u8]) -> Result<()> {
        self.sink.send(chunk).await
    }

    /// Notifies the watcher to stop and cancels the server side of the
    /// stream.
    pub fn reset(&self) {
        (self.reset)()
    }
}

/// Creates the per-session byte channel. Implemented by the enclosing
/// server, which owns the actual reducer transport.
pub trait ResyncChannelFactory: Send + Sync {
    fn new_channel(&self, reset: ResetCallback) -> ResyncChannel;
}

/// Byte sink backed by a bounded channel into the shared reducer link.
///
/// A full channel makes `send` wait, which is the backpressure that slows
/// the session loop down; a closed channel (reducer link gone) surfaces as
/// an error and ends the session.
pub struct DownstreamSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl DownstreamSink {
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ByteSink for DownstreamSink {
    async fn send(&mut self, chunk: &[u8]) -> Result<()> {
        self.tx
            .send(chunk.to_vec())
            .await
            .map_err(|_| anyhow!("downstream channel closed"))
    }
}

/// Factory handing every session a sink into the shared reducer link.
pub struct DownstreamFactory {
    tx: mpsc::Sender<Vec<u8>>,
}

impl DownstreamFactory {
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl ResyncChannelFactory for DownstreamFactory {
    fn new_channel(&self, reset: ResetCallback) -> ResyncChannel {
        ResyncChannel::new(Box::new(DownstreamSink::new(self.tx.clone())), reset)
    }
}
