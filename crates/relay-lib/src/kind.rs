//! Kubernetes workload owner kinds

/// Owner kind reported downstream with each pod record.
///
/// Only ReplicaSet and Job owners are tracked as entities in their own
/// right; the remaining kinds only ever appear as the reported owner on an
/// emitted pod record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OwnerKind {
    #[default]
    NoOwner = 0,
    ReplicaSet = 1,
    Deployment = 2,
    Job = 3,
    CronJob = 4,
    DaemonSet = 5,
    StatefulSet = 6,
}

impl OwnerKind {
    /// Maps a Kubernetes kind string to its wire value. Kinds outside the
    /// enumeration map to `NoOwner`; the pod carrying them is still
    /// reported.
    pub fn from_kind(kind: &str) -> OwnerKind {
        match kind {
            "ReplicaSet" => OwnerKind::ReplicaSet,
            "Deployment" => OwnerKind::Deployment,
            "Job" => OwnerKind::Job,
            "CronJob" => OwnerKind::CronJob,
            "DaemonSet" => OwnerKind::DaemonSet,
            "StatefulSet" => OwnerKind::StatefulSet,
            _ => OwnerKind::NoOwner,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
