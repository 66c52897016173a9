//! Custom Resource Definitions for the NFS Server Operator

mod nfs_server;

pub use nfs_server::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Vec<String> {
    vec![serde_yaml::to_string(&NfsServer::crd()).unwrap()]
}
