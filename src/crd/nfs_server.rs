//! NfsServer Custom Resource Definition

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default container image to run the NFS server with.
pub const DEFAULT_NFS_CONTAINER_IMAGE: &str = "apnar/nfs-ganesha";

/// Default backing volume size used when the spec leaves `size` empty.
pub const DEFAULT_SIZE: &str = "5Gi";

/// NfsServer resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "nfs.storageworks.io",
    version = "v1alpha1",
    kind = "NfsServer",
    plural = "nfsservers",
    singular = "nfsserver",
    shortname = "nfs",
    namespaced,
    status = "NfsServerStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Target", "type": "string", "jsonPath": ".status.remoteTarget"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NfsServerSpec {
    /// Size of the backing volume, as a Kubernetes quantity (e.g. "5Gi")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,

    /// Container image to use for the NFS server
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nfs_container: String,

    /// Annotations to set on each pod related object
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// The parameters to configure the NFS exports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportSpec>,

    /// Reclamation policy for the persistent volume shared to the user's pod.
    /// Valid values are "Delete", "Retain" and "Recycle"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub persistent_volume_reclaim_policy: String,

    /// PV mount options. Not validated - mount of the PVs will simply fail
    /// if one is invalid
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_options: Vec<String>,
}

impl NfsServerSpec {
    /// Requested volume size, falling back to the default.
    pub fn size(&self) -> &str {
        if self.size.is_empty() {
            DEFAULT_SIZE
        } else {
            &self.size
        }
    }

    /// NFS server container image, falling back to the default.
    pub fn container_image(&self) -> &str {
        if self.nfs_container.is_empty() {
            DEFAULT_NFS_CONTAINER_IMAGE
        } else {
            &self.nfs_container
        }
    }
}

/// A single NFS export
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpec {
    /// Name of the export, unique within the spec
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The NFS server configuration for this export
    #[serde(default)]
    pub server: ServerSpec,

    /// PVC from which the NFS daemon gets storage for sharing
    #[serde(default)]
    pub persistent_volume_claim: PersistentVolumeClaimVolumeSource,
}

/// Access configuration of an export
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Reading and writing permissions on the export.
    /// Valid values are "ReadOnly", "ReadWrite" and "None"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_mode: String,

    /// This prevents the root users connected remotely from having root
    /// privileges. Valid values are "none", "rootid", "root" and "all"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub squash: String,

    /// The clients allowed to access the NFS export
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_clients: Vec<AllowedClientsSpec>,
}

/// A named group of clients allowed to access an export
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllowedClientsSpec {
    /// Name of the clients group
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The clients that can access the share. Values can be hostname, ip
    /// address, netgroup, CIDR network address, or all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<String>,

    /// Access mode override for this group. Ignored when the export sets
    /// one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_mode: String,

    /// Squash override for this group. Ignored when the export sets one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub squash: String,
}

/// Observed state of an NfsServer
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NfsServerStatus {
    /// Current phase of the server
    #[serde(default)]
    pub phase: Phase,

    /// Address clients mount the exports from. Empty until the endpoint
    /// has been assigned one
    #[serde(default)]
    pub remote_target: String,
}

/// Server phase, recomputed from observations on every reconcile
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Phase {
    /// All dependent resources exist but the server is not serving yet
    Pending,
    /// The endpoint has an address and at least one replica is ready
    Running,
    /// One or more dependent resources could not be observed
    #[default]
    Unknown,
}
