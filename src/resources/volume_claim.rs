//! Backing PersistentVolumeClaim for the server's export data

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::NfsServer;

use super::{labels_for, owner_references};

// TODO: make the storage class configurable in the spec.
const STORAGE_CLASS_NAME: &str = "fast";

/// Claim the server stores export data on, named after the server.
pub fn volume_claim(nfs: &NfsServer) -> PersistentVolumeClaim {
    let name = nfs.name_any();
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: nfs.namespace(),
            labels: Some(labels_for(&name)),
            owner_references: owner_references(nfs),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: Some(STORAGE_CLASS_NAME.to_string()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(nfs.spec.size().to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
