//! Test support: capturing byte sink and record decoding.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::buffered::BufferedWriter;
use super::writer::{IngestWriter, POD_CONTAINER, POD_DELETE, POD_NEW_WITH_NAME};
use crate::resync::{ByteSink, ResetCallback, ResyncChannel};

/// Byte sink that records every flushed chunk.
#[derive(Clone, Default)]
pub(crate) struct CaptureSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CaptureSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().unwrap().clone()
    }

    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.chunks.lock().unwrap().concat()
    }
}

#[async_trait]
impl ByteSink for CaptureSink {
    async fn send(&mut self, chunk: &[u8]) -> Result<()> {
        self.chunks.lock().unwrap().push(chunk.to_vec());
        Ok(())
    }
}

pub(crate) fn capture_channel() -> (ResyncChannel, CaptureSink) {
    capture_channel_with_reset(Box::new(|| {}))
}

pub(crate) fn capture_channel_with_reset(reset: ResetCallback) -> (ResyncChannel, CaptureSink) {
    let sink = CaptureSink::new();
    let channel = ResyncChannel::new(Box::new(sink.clone()), reset);
    (channel, sink)
}

/// Ingest writer over a capture sink with a fixed clock, so emitted bytes
/// are deterministic.
pub(crate) fn test_writer(capacity: usize) -> (IngestWriter, CaptureSink) {
    let (channel, sink) = capture_channel();
    let writer = IngestWriter::new(BufferedWriter::new(channel, capacity), Box::new(|| 0));
    (writer, sink)
}

/// Decoded downstream record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Record {
    PodNew {
        uid: String,
        ip: u32,
        owner_name: String,
        pod_name: String,
        owner_kind: u8,
        owner_uid: String,
        is_host_network: bool,
        ns: String,
        version: String,
    },
    PodContainer {
        pod_uid: String,
        id: String,
        name: String,
        image: String,
    },
    PodDelete {
        uid: String,
    },
}

pub(crate) fn decode_records(mut bytes: &[u8]) -> Vec<Record> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        let record_type = take_u16(&mut bytes);
        let _timestamp = take_u64(&mut bytes);
        let record = match record_type {
            POD_NEW_WITH_NAME => {
                let uid = take_blob(&mut bytes);
                let ip = take_u32(&mut bytes);
                let owner_name = take_blob(&mut bytes);
                let pod_name = take_blob(&mut bytes);
                let owner_kind = take_u8(&mut bytes);
                let owner_uid = take_blob(&mut bytes);
                let is_host_network = take_u8(&mut bytes) != 0;
                let ns = take_blob(&mut bytes);
                let version = take_blob(&mut bytes);
                Record::PodNew {
                    uid,
                    ip,
                    owner_name,
                    pod_name,
                    owner_kind,
                    owner_uid,
                    is_host_network,
                    ns,
                    version,
                }
            }
            POD_CONTAINER => {
                let pod_uid = take_blob(&mut bytes);
                let id = take_blob(&mut bytes);
                let name = take_blob(&mut bytes);
                let image = take_blob(&mut bytes);
                Record::PodContainer {
                    pod_uid,
                    id,
                    name,
                    image,
                }
            }
            POD_DELETE => Record::PodDelete {
                uid: take_blob(&mut bytes),
            },
            other => panic!("unknown record type {}", other),
        };
        records.push(record);
    }
    records
}

fn take_u8(bytes: &mut &[u8]) -> u8 {
    let value = bytes[0];
    *bytes = &bytes[1..];
    value
}

fn take_u16(bytes: &mut &[u8]) -> u16 {
    let value = u16::from_le_bytes([bytes[0], bytes[1]]);
    *bytes = &bytes[2..];
    value
}

fn take_u32(bytes: &mut &[u8]) -> u32 {
    let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    *bytes = &bytes[4..];
    value
}

fn take_u64(bytes: &mut &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    *bytes = &bytes[8..];
    u64::from_le_bytes(buf)
}

fn take_blob(bytes: &mut &[u8]) -> String {
    let len = take_u16(bytes) as usize;
    let value = String::from_utf8(bytes[..len].to_vec()).expect("blob is utf-8");
    *bytes = &bytes[len..];
    value
}
