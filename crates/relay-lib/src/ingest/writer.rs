//! Typed record encoding for the reducer
//!
//! Three record types flow downstream: a pod creation record, one container
//! record per container, and a pod deletion record. Frames are
//! little-endian, `u16 record type | u64 timestamp ns | fields`, with
//! strings as u16-length-prefixed blobs.

use anyhow::Result;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use super::buffered::BufferedWriter;
use crate::kind::OwnerKind;
use crate::resync::ResyncChannel;

pub const POD_NEW_WITH_NAME: u16 = 1;
pub const POD_CONTAINER: u16 = 2;
pub const POD_DELETE: u16 = 3;

/// Timestamp source for emitted records, in nanoseconds.
pub type Clock = Box<dyn Fn() -> u64 + Send>;

/// Wall-clock nanoseconds since the epoch; the default record clock.
pub fn wall_clock() -> Clock {
    Box::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    })
}

/// Encodes a dotted IPv4 string as its 32-bit network-byte-order value.
///
/// An empty or unparseable address encodes as 0; the record is still
/// emitted.
pub fn encode_ipv4(ip: &str) -> u32 {
    ip.parse::<Ipv4Addr>()
        .map(|addr| u32::from_le_bytes(addr.octets()))
        .unwrap_or(0)
}

/// Typed record sink over the buffered frame writer.
pub struct IngestWriter {
    out: BufferedWriter,
    clock: Clock,
}

impl IngestWriter {
    pub fn new(out: BufferedWriter, clock: Clock) -> Self {
        Self { out, clock }
    }

    /// Announces a pod with its resolved workload owner.
    #[allow(clippy::too_many_arguments)]
    pub async fn pod_new_with_name(
        &mut self,
        uid: &str,
        ipv4: u32,
        owner_name: &str,
        pod_name: &str,
        owner_kind: OwnerKind,
        owner_uid: &str,
        is_host_network: bool,
        ns: &str,
        version: &str,
    ) -> Result<()> {
        let mut rec = self.frame(POD_NEW_WITH_NAME);
        put_blob(&mut rec, uid);
        rec.extend_from_slice(&ipv4.to_le_bytes());
        put_blob(&mut rec, owner_name);
        put_blob(&mut rec, pod_name);
        rec.push(owner_kind.as_u8());
        put_blob(&mut rec, owner_uid);
        rec.push(u8::from(is_host_network));
        put_blob(&mut rec, ns);
        put_blob(&mut rec, version);
        self.out.write_record(&rec).await
    }

    /// Reports one container of an announced pod.
    pub async fn pod_container(
        &mut self,
        pod_uid: &str,
        id: &str,
        name: &str,
        image: &str,
    ) -> Result<()> {
        let mut rec = self.frame(POD_CONTAINER);
        put_blob(&mut rec, pod_uid);
        put_blob(&mut rec, id);
        put_blob(&mut rec, name);
        put_blob(&mut rec, image);
        self.out.write_record(&rec).await
    }

    /// Retires an announced pod.
    pub async fn pod_delete(&mut self, uid: &str) -> Result<()> {
        let mut rec = self.frame(POD_DELETE);
        put_blob(&mut rec, uid);
        self.out.write_record(&rec).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.out.flush().await
    }

    /// Drops any bytes still buffered, without sending them.
    pub fn discard(&mut self) {
        self.out.discard()
    }

    pub fn channel(&self) -> &ResyncChannel {
        self.out.channel()
    }

    fn frame(&self, record_type: u16) -> Vec<u8> {
        let mut rec = Vec::with_capacity(64);
        rec.extend_from_slice(&record_type.to_le_bytes());
        rec.extend_from_slice(&(self.clock)().to_le_bytes());
        rec
    }
}

/// Appends a u16-length-prefixed blob. Lengths saturate at u16::MAX.
fn put_blob(buf: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(u16::MAX as usize);
    buf.extend_from_slice(&(len as u16).to_le_bytes());
    buf.extend_from_slice(&bytes[..len]);
}
