//! Pod/owner correlation
//!
//! This module answers the question "what is the effective workload owner
//! of this pod?" across out-of-order watch events:
//! - UID interning so cross-references are compact integer handles
//! - Owner and pod tables with waiter and tombstone bookkeeping
//! - Merge rules for partial MODIFY updates
//! - The correlator that turns events into downstream records

mod handler;
mod intern;
mod merge;
mod store;


pub use handler::{CorrelationLimits, CorrelationStats, Correlator};
pub use intern::{Id, UidInterner};
