//! Cluster-local Service exposing the NFS server ports

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::NfsServer;

use super::{labels_for, owner_references};

/// ClusterIP Service named after the server, selecting its pods and
/// exposing the NFS, RPC and metrics ports.
pub fn service(nfs: &NfsServer, nfs_port: i32, rpc_port: i32, metrics_port: i32) -> Service {
    let name = nfs.name_any();
    Service {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: nfs.namespace(),
            labels: Some(labels_for(&name)),
            owner_references: owner_references(nfs),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(labels_for(&name)),
            ports: Some(vec![
                named_port("nfs", nfs_port),
                named_port("rpc", rpc_port),
                named_port("metrics", metrics_port),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn named_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}
