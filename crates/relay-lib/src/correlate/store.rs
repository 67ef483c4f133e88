//! Correlation tables
//!
//! Two independent tables (owners, pods) plus two reverse indexes: the pods
//! waiting for an unseen owner, and the owner ids they wait on. All state
//! is per-session and owned by the correlator; nothing here is shared.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use super::intern::Id;
use crate::proto::{OwnerInfo, PodInfo};

/// ReplicaSet/Job state keyed by interned id.
#[derive(Debug, Default)]
pub(super) struct OwnerStore {
    /// Parent descriptor recorded for each known ReplicaSet/Job: the
    /// Deployment behind a ReplicaSet, the CronJob behind a Job, or an
    /// empty descriptor when the controller has no parent.
    pub infos: FxHashMap<Id, OwnerInfo>,

    /// Tombstone queue of recently deleted owners, oldest first.
    pub deleted: VecDeque<Id>,

    /// Pods blocked on an owner id that has not been observed yet.
    pub waiting: FxHashMap<Id, Vec<Id>>,
}

/// Pod state keyed by interned id.
#[derive(Debug, Default)]
pub(super) struct PodStore {
    pub infos: FxHashMap<Id, PodInfo>,

    /// Pods whose creation record has been emitted downstream.
    pub live: FxHashSet<Id>,

    /// Pods blocked on a yet-unseen ReplicaSet/Job.
    pub waiting: FxHashSet<Id>,
}
