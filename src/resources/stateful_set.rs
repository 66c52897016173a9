//! StatefulSet running the ganesha server

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, EnvVar,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use crate::crd::NfsServer;

use super::{labels_for, owner_references};

/// Single-replica StatefulSet mounting the ganesha config and the backing
/// volume claim. The server requires the mount administration and raw read
/// bypass capabilities to re-export the claim.
pub fn stateful_set(
    nfs: &NfsServer,
    nfs_port: i32,
    rpc_port: i32,
    metrics_port: i32,
) -> StatefulSet {
    let name = nfs.name_any();
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: nfs.namespace(),
            labels: Some(labels_for(&name)),
            owner_references: owner_references(nfs),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            service_name: name.clone(),
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels_for(&name)),
                ..Default::default()
            },
            template: pod_template(nfs, nfs_port, rpc_port, metrics_port),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pod_template(
    nfs: &NfsServer,
    nfs_port: i32,
    rpc_port: i32,
    metrics_port: i32,
) -> PodTemplateSpec {
    let name = nfs.name_any();
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels_for(&name)),
            annotations: if nfs.spec.annotations.is_empty() {
                None
            } else {
                Some(nfs.spec.annotations.clone())
            },
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "ganesha".to_string(),
                image: Some(nfs.spec.container_image().to_string()),
                image_pull_policy: Some("IfNotPresent".to_string()),
                env: Some(vec![EnvVar {
                    name: "GANESHA_CONFIGFILE".to_string(),
                    value: Some(format!("/config/{}", name)),
                    ..Default::default()
                }]),
                ports: Some(vec![
                    container_port("nfs-port", nfs_port),
                    container_port("rpc-port", rpc_port),
                    container_port("metrics-port", metrics_port),
                ]),
                volume_mounts: Some(vec![
                    VolumeMount {
                        name: "nfs-config".to_string(),
                        mount_path: "/config".to_string(),
                        ..Default::default()
                    },
                    VolumeMount {
                        name: "nfs-data".to_string(),
                        mount_path: "/export".to_string(),
                        ..Default::default()
                    },
                ]),
                security_context: Some(SecurityContext {
                    capabilities: Some(Capabilities {
                        add: Some(vec![
                            "SYS_ADMIN".to_string(),
                            "DAC_READ_SEARCH".to_string(),
                        ]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            volumes: Some(vec![
                Volume {
                    name: "nfs-config".to_string(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: name.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Volume {
                    name: "nfs-data".to_string(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: name,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}
