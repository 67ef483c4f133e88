//! Byte-budget frame buffering
//!
//! Coalesces the records of one logical event and sends them downstream as
//! a single chunk on flush. Records are never split across chunks: if a
//! record would push the buffer past its budget, the buffered bytes go out
//! first.

use anyhow::Result;

use crate::resync::ResyncChannel;

/// Default per-session byte budget for record coalescing.
pub const DEFAULT_COLLECT_BUFFER_SIZE: usize = 16 * 1024;

pub struct BufferedWriter {
    channel: ResyncChannel,
    buf: Vec<u8>,
    capacity: usize,
}

impl BufferedWriter {
    pub fn new(channel: ResyncChannel, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel,
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends one whole record, flushing first if it would not fit.
    pub async fn write_record(&mut self, record: &[u8]) -> Result<()> {
        if !self.buf.is_empty() && self.buf.len() + record.len() > self.capacity {
            self.flush().await?;
        }
        self.buf.extend_from_slice(record);
        Ok(())
    }

    /// Sends everything buffered as one chunk. A no-op on an empty buffer.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.channel.send(&self.buf).await?;
        self.buf.clear();
        Ok(())
    }

    /// Drops buffered bytes without sending them.
    pub fn discard(&mut self) {
        self.buf.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn channel(&self) -> &ResyncChannel {
        &self.channel
    }
}
