//! Correlation core
//!
//! Consumes pod/replica-set/job watch events and decides which records go
//! downstream. A pod is announced once its ip is known and its effective
//! workload owner can be named. Pods whose ReplicaSet/Job has not arrived
//! yet wait, and are re-evaluated when the owner shows up; deleted owners
//! linger in a tombstone queue so in-flight pod events still see them.

use anyhow::Result;
use std::collections::hash_map::Entry;
use tracing::{error, info, trace, warn};

use super::intern::UidInterner;
use super::merge::{merge_owner_info, merge_pod_info};
use super::store::{OwnerStore, PodStore};
use crate::ingest::{encode_ipv4, IngestWriter};
use crate::kind::OwnerKind;
use crate::observability::RelayMetrics;
use crate::proto::{JobInfo, OwnerInfo, PodInfo, ReplicaSetInfo};

/// Safety bounds for the per-session tables.
#[derive(Debug, Clone)]
pub struct CorrelationLimits {
    /// Pods allowed to wait for an unseen ReplicaSet/Job before the
    /// session is forcibly restarted.
    pub max_waiting_pods: usize,
    /// Tombstoned owners retained before the oldest is purged.
    pub max_deleted_owners: usize,
}

impl Default for CorrelationLimits {
    fn default() -> Self {
        Self {
            max_waiting_pods: 10_000,
            max_deleted_owners: 10_000,
        }
    }
}

/// Correlation table sizes, for gauges and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationStats {
    pub pods_tracked: usize,
    pub pods_live: usize,
    pub pods_waiting: usize,
    pub owners_tracked: usize,
    pub owners_tombstoned: usize,
}

/// Per-session correlation state and the writer it feeds.
///
/// Owned by exactly one session loop; no locking, no sharing.
pub struct Correlator {
    writer: IngestWriter,
    limits: CorrelationLimits,
    metrics: RelayMetrics,
    intern: UidInterner,
    owners: OwnerStore,
    pods: PodStore,
}

impl Correlator {
    pub fn new(writer: IngestWriter, limits: CorrelationLimits, metrics: RelayMetrics) -> Self {
        Self {
            writer,
            limits,
            metrics,
            intern: UidInterner::new(),
            owners: OwnerStore::default(),
            pods: PodStore::default(),
        }
    }

    /// True when the waiting set has hit its bound and the stream must be
    /// restarted from a fresh list.
    pub fn need_restart(&self) -> bool {
        self.pods.waiting.len() >= self.limits.max_waiting_pods
    }

    pub fn stats(&self) -> CorrelationStats {
        CorrelationStats {
            pods_tracked: self.pods.infos.len(),
            pods_live: self.pods.live.len(),
            pods_waiting: self.pods.waiting.len(),
            owners_tracked: self.owners.infos.len(),
            owners_tombstoned: self.owners.deleted.len(),
        }
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await
    }

    /// Drops any bytes still buffered, without sending them.
    pub fn discard(&mut self) {
        self.writer.discard()
    }

    /// Tears the session down so the watcher re-lists everything.
    pub fn reset(&self) {
        self.writer.channel().reset()
    }

    pub async fn replica_set_new_or_modified(&mut self, rs_info: ReplicaSetInfo) -> Result<()> {
        if rs_info.uid.is_empty() {
            warn!("replica set info without uid");
            self.metrics.inc_malformed_events();
            return Ok(());
        }

        let owner = rs_info.owner.unwrap_or_default();
        self.owner_new_or_modified(&rs_info.uid, owner).await
    }

    pub fn replica_set_deleted(&mut self, rs_info: &ReplicaSetInfo) {
        if rs_info.uid.is_empty() {
            warn!("replica set delete event without uid");
            self.metrics.inc_malformed_events();
            return;
        }

        self.owner_deleted(&rs_info.uid);
    }

    pub async fn job_new_or_modified(&mut self, job_info: JobInfo) -> Result<()> {
        if job_info.uid.is_empty() {
            warn!("job info without uid");
            self.metrics.inc_malformed_events();
            return Ok(());
        }

        let owner = job_info.owner.unwrap_or_default();
        self.owner_new_or_modified(&job_info.uid, owner).await
    }

    pub fn job_deleted(&mut self, job_info: &JobInfo) {
        if job_info.uid.is_empty() {
            warn!("job delete event without uid");
            self.metrics.inc_malformed_events();
            return;
        }

        self.owner_deleted(&job_info.uid);
    }

    pub async fn pod_new_or_modified(&mut self, pod_info: PodInfo) -> Result<()> {
        if pod_info.uid.is_empty() {
            warn!(name = %pod_info.name, ns = %pod_info.ns, "pod info without uid");
            self.metrics.inc_malformed_events();
            return Ok(());
        }

        let id = self.intern.intern(&pod_info.uid);
        match self.pods.infos.entry(id) {
            Entry::Occupied(mut entry) => {
                merge_pod_info(entry.get_mut(), &pod_info);
                trace!(uid = %pod_info.uid, "merged pod into session state");
            }
            Entry::Vacant(entry) => {
                trace!(uid = %pod_info.uid, "tracking new pod");
                entry.insert(pod_info.clone());
            }
        }

        if self.pods.live.contains(&id) {
            // Already announced; container churn is the only observable
            // update, re-emitted from the incoming body.
            trace!(uid = %pod_info.uid, "pod already reported, sending containers only");
            send_pod_containers(&mut self.writer, &pod_info, &self.metrics).await?;
            return Ok(());
        }

        let Some(pod) = self.pods.infos.get(&id) else {
            return Ok(());
        };

        if pod.ip.is_empty() {
            trace!(uid = %pod.uid, "pod has no ip yet, holding");
            return Ok(());
        }

        let Some(pod_owner) = pod.owner.as_ref() else {
            trace!(uid = %pod.uid, "pod has no owner, sending");
            send_pod_new_no_owner(&mut self.writer, pod, &self.metrics).await?;
            self.pods.live.insert(id);
            return Ok(());
        };

        let owner_kind = OwnerKind::from_kind(&pod_owner.kind);
        if owner_kind != OwnerKind::ReplicaSet && owner_kind != OwnerKind::Job {
            trace!(uid = %pod.uid, owner_kind = %pod_owner.kind, "pod not owned by replica set or job, sending");
            send_pod_new(&mut self.writer, pod, pod_owner, &self.metrics).await?;
            self.pods.live.insert(id);
            return Ok(());
        }

        // Owned by a ReplicaSet or Job; its parent decides what the
        // downstream sees, so the owner must have been observed first.
        let owner_uid = pod_owner.uid.clone();
        let owner_id = self.intern.intern(&owner_uid);

        let Some(parent) = self.owners.infos.get(&owner_id) else {
            trace!(uid = %pod.uid, owner_uid = %owner_uid, "pod's owner not seen yet, waiting");
            self.owners.waiting.entry(owner_id).or_default().push(id);
            self.pods.waiting.insert(id);
            return Ok(());
        };

        let parent_kind = OwnerKind::from_kind(&parent.kind);
        let two_hop = (owner_kind == OwnerKind::ReplicaSet && parent_kind == OwnerKind::Deployment)
            || (owner_kind == OwnerKind::Job && parent_kind == OwnerKind::CronJob);
        if two_hop {
            trace!(uid = %pod.uid, parent_uid = %parent.uid, parent_kind = %parent.kind, "sending pod with resolved parent");
            send_pod_new(&mut self.writer, pod, parent, &self.metrics).await?;
        } else {
            trace!(uid = %pod.uid, owner_uid = %pod_owner.uid, "sending pod with its direct owner");
            send_pod_new(&mut self.writer, pod, pod_owner, &self.metrics).await?;
        }
        self.pods.live.insert(id);
        Ok(())
    }

    pub async fn pod_deleted(&mut self, pod_info: PodInfo) -> Result<()> {
        if pod_info.uid.is_empty() {
            error!(name = %pod_info.name, ns = %pod_info.ns, "pod delete event without uid");
            self.metrics.inc_malformed_events();
            return Ok(());
        }

        let id = self.intern.intern(&pod_info.uid);
        if self.pods.live.contains(&id) {
            trace!(uid = %pod_info.uid, "enqueue pod delete");
            self.writer.pod_delete(&pod_info.uid).await?;
            self.metrics.inc_records_emitted();
        }

        self.pods.live.remove(&id);
        self.pods.infos.remove(&id);
        self.pods.waiting.remove(&id);
        self.intern.forget(&pod_info.uid);
        Ok(())
    }

    /// Upserts the parent descriptor recorded for a ReplicaSet/Job, then
    /// re-evaluates every pod that was waiting on it.
    async fn owner_new_or_modified(&mut self, uid: &str, owner_info: OwnerInfo) -> Result<()> {
        let id = self.intern.intern(uid);
        match self.owners.infos.entry(id) {
            Entry::Occupied(mut entry) => {
                merge_owner_info(entry.get_mut(), &owner_info);
            }
            Entry::Vacant(entry) => {
                entry.insert(owner_info.clone());
            }
        }

        let Some(waiters) = self.owners.waiting.remove(&id) else {
            return Ok(());
        };

        let parent_kind = OwnerKind::from_kind(&owner_info.kind);
        let default_owner = OwnerInfo::default();
        for pod_id in waiters {
            let Some(pod) = self.pods.infos.get(&pod_id) else {
                // The pod has been deleted in the meantime.
                continue;
            };
            if self.pods.live.contains(&pod_id) {
                // Already announced; a duplicate waiter entry must not
                // announce it again.
                continue;
            }

            let current_owner_uid = pod.owner.as_ref().map(|o| o.uid.as_str()).unwrap_or("");
            let current_owner_id = self.intern.intern(current_owner_uid);
            if current_owner_id != id {
                // The pod has been re-parented and no longer waits on this
                // owner.
                continue;
            }

            if parent_kind == OwnerKind::Deployment || parent_kind == OwnerKind::CronJob {
                send_pod_new(&mut self.writer, pod, &owner_info, &self.metrics).await?;
            } else {
                let direct = pod.owner.as_ref().unwrap_or(&default_owner);
                send_pod_new(&mut self.writer, pod, direct, &self.metrics).await?;
            }
            self.pods.waiting.remove(&pod_id);
            self.pods.live.insert(pod_id);
        }
        Ok(())
    }

    /// Tombstones an owner. The entry stays visible until its tombstone
    /// ages out of the queue, so pod events already in flight still resolve.
    fn owner_deleted(&mut self, uid: &str) {
        let id = self.intern.intern(uid);
        if !self.owners.infos.contains_key(&id) {
            self.intern.forget(uid);
            return;
        }

        self.owners.deleted.push_back(id);
        if self.owners.deleted.len() <= self.limits.max_deleted_owners {
            return;
        }

        let Some(expired_id) = self.owners.deleted.pop_front() else {
            return;
        };
        if self.owners.infos.remove(&expired_id).is_none() {
            info!("owner removed before its tombstone expired");
            return;
        }
        self.intern.forget_id(expired_id);
    }
}

#[cfg(test)]
impl Correlator {
    pub(crate) fn is_live(&self, uid: &str) -> bool {
        self.intern
            .get(uid)
            .map(|id| self.pods.live.contains(&id))
            .unwrap_or(false)
    }

    pub(crate) fn is_waiting(&self, uid: &str) -> bool {
        self.intern
            .get(uid)
            .map(|id| self.pods.waiting.contains(&id))
            .unwrap_or(false)
    }

    pub(crate) fn interned_uids(&self) -> usize {
        self.intern.len()
    }
}

async fn send_pod_new(
    writer: &mut IngestWriter,
    pod: &PodInfo,
    owner: &OwnerInfo,
    metrics: &RelayMetrics,
) -> Result<()> {
    trace!(uid = %pod.uid, owner_uid = %owner.uid, "enqueue pod new");

    writer
        .pod_new_with_name(
            &pod.uid,
            encode_ipv4(&pod.ip),
            &owner.name,
            &pod.name,
            OwnerKind::from_kind(&owner.kind),
            &owner.uid,
            pod.is_host_network,
            &pod.ns,
            &pod.version,
        )
        .await?;
    metrics.inc_records_emitted();

    send_pod_containers(writer, pod, metrics).await
}

async fn send_pod_new_no_owner(
    writer: &mut IngestWriter,
    pod: &PodInfo,
    metrics: &RelayMetrics,
) -> Result<()> {
    trace!(uid = %pod.uid, "enqueue pod new without owner");

    writer
        .pod_new_with_name(
            &pod.uid,
            encode_ipv4(&pod.ip),
            &pod.name,
            &pod.name,
            OwnerKind::NoOwner,
            "",
            pod.is_host_network,
            &pod.ns,
            &pod.version,
        )
        .await?;
    metrics.inc_records_emitted();

    send_pod_containers(writer, pod, metrics).await
}

async fn send_pod_containers(
    writer: &mut IngestWriter,
    pod: &PodInfo,
    metrics: &RelayMetrics,
) -> Result<()> {
    for container in &pod.container_infos {
        writer
            .pod_container(&pod.uid, &container.id, &container.name, &container.image)
            .await?;
        metrics.inc_records_emitted();
    }
    Ok(())
}
