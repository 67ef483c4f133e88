//! Record emission to the reducer
//!
//! This module provides the typed record sink used by the correlator:
//! - Record encoding for pod creation, container and deletion records
//! - A buffered frame writer with a per-session byte budget
//! - Event-granular flushing, so a lifecycle record is never held back

mod buffered;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use buffered::{BufferedWriter, DEFAULT_COLLECT_BUFFER_SIZE};
pub use writer::{
    encode_ipv4, wall_clock, Clock, IngestWriter, POD_CONTAINER, POD_DELETE, POD_NEW_WITH_NAME,
};
