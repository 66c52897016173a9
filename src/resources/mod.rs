//! Builders for the Kubernetes resources managed for each NfsServer
//!
//! Every builder is a pure function of the NfsServer object: the same spec
//! always produces an identical desired resource, which is what makes the
//! repeated create-or-update passes in the reconciler idempotent.

mod config;
mod service;
mod stateful_set;
mod volume_claim;

pub use config::{config_map, render_config};
pub use service::service;
pub use stateful_set::stateful_set;
pub use volume_claim::volume_claim;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::crd::NfsServer;

pub(crate) const APP_NAME: &str = "nfs-server";

/// Default port the NFS protocol is served on
pub const DEFAULT_NFS_PORT: i32 = 2049;

/// Default port for RPC
pub const DEFAULT_RPC_PORT: i32 = 111;

/// Default port the NFS server exposes metrics on
pub const DEFAULT_METRICS_PORT: i32 = 9587;

/// Labels selecting the pods of a named NfsServer
pub fn labels_for(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), APP_NAME.to_string()),
        ("nfs_server_cr".to_string(), name.to_string()),
    ])
}

/// Controller owner reference pointing dependent resources back at their
/// NfsServer, so the garbage collector and explicit teardown stay
/// consistent. None when the object has not been persisted yet (no uid).
pub(crate) fn owner_references(nfs: &NfsServer) -> Option<Vec<OwnerReference>> {
    nfs.controller_owner_ref(&()).map(|oref| vec![oref])
}
