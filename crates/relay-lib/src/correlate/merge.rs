//! MODIFY merge rules
//!
//! The watcher sends partial updates, so MODIFY merges the incoming body
//! into the stored one instead of replacing it: non-empty fields win, and a
//! status-only update without containers keeps the stored container list.

use crate::proto::{OwnerInfo, PodInfo};

pub(super) fn merge_owner_info(dst: &mut OwnerInfo, src: &OwnerInfo) {
    if !src.uid.is_empty() {
        dst.uid.clone_from(&src.uid);
    }
    if !src.name.is_empty() {
        dst.name.clone_from(&src.name);
    }
    if !src.kind.is_empty() {
        dst.kind.clone_from(&src.kind);
    }
}

pub(super) fn merge_pod_info(dst: &mut PodInfo, src: &PodInfo) {
    if !src.uid.is_empty() {
        dst.uid.clone_from(&src.uid);
    }
    if !src.ip.is_empty() {
        dst.ip.clone_from(&src.ip);
    }
    if !src.name.is_empty() {
        dst.name.clone_from(&src.name);
    }
    if !src.ns.is_empty() {
        dst.ns.clone_from(&src.ns);
    }
    if !src.version.is_empty() {
        dst.version.clone_from(&src.version);
    }
    if src.is_host_network {
        dst.is_host_network = true;
    }
    if let Some(src_owner) = &src.owner {
        match &mut dst.owner {
            Some(dst_owner) => merge_owner_info(dst_owner, src_owner),
            None => dst.owner = Some(src_owner.clone()),
        }
    }
    // A non-empty incoming list replaces the stored one; appending (the
    // protobuf repeated-field merge) would duplicate containers on every
    // update that carries them.
    if !src.container_infos.is_empty() {
        dst.container_infos = src.container_infos.clone();
    }
}
