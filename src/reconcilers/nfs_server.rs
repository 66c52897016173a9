//! NfsServer reconciler
//!
//! Converges the dependent resources of a server (Service, ConfigMap,
//! PersistentVolumeClaim, StatefulSet) towards the spec, derives the
//! server status from what is actually observed, and tears everything
//! down when the object is deleted. Every step is idempotent: a pass that
//! aborts midway leaves a valid state that the next delivery completes.

use std::collections::BTreeSet;
use std::fmt::Debug;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::crd::{NfsServer, NfsServerStatus, Phase, ServerSpec};
use crate::error::{self, Error, Result};
use crate::metrics;
use crate::resources::{
    self, DEFAULT_METRICS_PORT, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT,
};

/// Finalizer guarding deletion of NfsServer resources
pub const FINALIZER_NAME: &str = "nfs.storageworks.io/server-finalizer";

/// Field manager name used for status patches
const FIELD_MANAGER: &str = "nfs-server-operator";

/// Where an NfsServer sits in its lifecycle, derived from whether our
/// finalizer is present and whether deletion has been requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Observed for the first time: the deletion guard must be written
    /// before anything is deployed
    Unregistered,
    /// Guarded and not deleting: converge the dependent resources
    Active,
    /// Deletion requested while guarded: tear down and release
    Terminating,
    /// Deletion requested and the guard already removed: nothing to do
    Released,
}

impl Lifecycle {
    /// Classify the lifecycle cell the object is in.
    pub fn of(nfs: &NfsServer) -> Self {
        let deleting = nfs.meta().deletion_timestamp.is_some();
        let guarded = nfs
            .meta()
            .finalizers
            .as_ref()
            .map_or(false, |f| f.iter().any(|f| f == FINALIZER_NAME));

        match (guarded, deleting) {
            (false, false) => Lifecycle::Unregistered,
            (true, false) => Lifecycle::Active,
            (true, true) => Lifecycle::Terminating,
            (false, true) => Lifecycle::Released,
        }
    }
}

/// Validate the NfsServer spec
pub fn validate(nfs: &NfsServer) -> Result<()> {
    validate_size(nfs.spec.size())?;

    match nfs.spec.persistent_volume_reclaim_policy.as_str() {
        "" | "Delete" | "Retain" | "Recycle" => {}
        other => {
            return Err(Error::validation(format!(
                "Invalid reclaim policy '{}': must be one of: Delete, Retain, Recycle",
                other
            )));
        }
    }

    let mut names = BTreeSet::new();
    for export in &nfs.spec.exports {
        if !names.insert(export.name.as_str()) {
            return Err(Error::validation(format!(
                "Duplicate export name '{}'",
                export.name
            )));
        }
        if export.persistent_volume_claim.claim_name.is_empty() {
            return Err(Error::validation(format!(
                "Export '{}' does not reference a persistent volume claim",
                export.name
            )));
        }
        validate_server(&export.server)?;
    }

    Ok(())
}

fn validate_server(server: &ServerSpec) -> Result<()> {
    validate_access_mode(&server.access_mode)?;
    validate_squash(&server.squash)?;
    for group in &server.allowed_clients {
        validate_access_mode(&group.access_mode)?;
        validate_squash(&group.squash)?;
    }
    Ok(())
}

fn validate_access_mode(mode: &str) -> Result<()> {
    match mode.to_lowercase().as_str() {
        "" | "none" | "readonly" | "readwrite" => Ok(()),
        other => Err(Error::validation(format!(
            "Invalid access mode '{}': must be one of: ReadOnly, ReadWrite, None",
            other
        ))),
    }
}

fn validate_squash(squash: &str) -> Result<()> {
    match squash.to_lowercase().as_str() {
        "" | "none" | "rootid" | "root" | "all" => Ok(()),
        other => Err(Error::validation(format!(
            "Invalid squash '{}': must be one of: none, rootid, root, all",
            other
        ))),
    }
}

const QUANTITY_SUFFIXES: &[&str] = &[
    "n", "u", "m", "k", "M", "G", "T", "P", "E", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei",
];

/// Check that a size is a well-formed, non-negative Kubernetes quantity.
fn validate_size(size: &str) -> Result<()> {
    let split = size
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size.len());
    let (number, suffix) = size.split_at(split);

    let parsed = number.parse::<f64>();
    let valid = parsed.map_or(false, |n| n >= 0.0)
        && (suffix.is_empty() || QUANTITY_SUFFIXES.contains(&suffix));
    if !valid {
        return Err(Error::validation(format!("Invalid size quantity '{}'", size)));
    }
    Ok(())
}

/// Append the deletion guard to the object. The write carries the observed
/// resource version, and the resulting change event re-delivers the object
/// for the deploy pass, so no dependent resource can exist without the
/// guard being durable first.
pub async fn register_finalizer(api: &Api<NfsServer>, nfs: &NfsServer) -> Result<()> {
    let mut updated = nfs.clone();
    updated
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER_NAME.to_string());
    api.replace(&nfs.name_any(), &PostParams::default(), &updated)
        .await?;
    Ok(())
}

/// Remove the deletion guard, releasing the object to the garbage
/// collector.
pub async fn release_finalizer(api: &Api<NfsServer>, nfs: &NfsServer) -> Result<()> {
    let mut updated = nfs.clone();
    if let Some(finalizers) = updated.meta_mut().finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER_NAME);
    }
    api.replace(&nfs.name_any(), &PostParams::default(), &updated)
        .await?;
    Ok(())
}

/// Converge all dependent resources of a server. The workload mounts both
/// the config artifact and the claim by name, so those must exist before
/// it; the endpoint goes first so its address can be observed as early as
/// possible. A failure aborts the remaining steps and the pass is retried
/// through redelivery.
pub async fn deploy(client: &Client, nfs: &NfsServer) -> Result<()> {
    let namespace = namespace(nfs)?;

    info!(name = %nfs.name_any(), "Converging dependent resources");

    let services: Api<Service> = Api::namespaced(client.clone(), &namespace);
    let desired = resources::service(nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);
    ensure(&services, desired, retain_cluster_ip).await?;
    metrics::CONVERGENCES.with_label_values(&["Service"]).inc();

    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);
    ensure(&config_maps, resources::config_map(nfs), |_, _| {}).await?;
    metrics::CONVERGENCES.with_label_values(&["ConfigMap"]).inc();

    let claims: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace);
    ensure(&claims, resources::volume_claim(nfs), retain_claim_binding).await?;
    metrics::CONVERGENCES
        .with_label_values(&["PersistentVolumeClaim"])
        .inc();

    let stateful_sets: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);
    let desired =
        resources::stateful_set(nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);
    ensure(&stateful_sets, desired, |_, _| {}).await?;
    metrics::CONVERGENCES.with_label_values(&["StatefulSet"]).inc();

    Ok(())
}

/// Converge one resource: create it, and when it already exists update it
/// in place with the desired representation. `retain` copies over fields
/// the API server assigned to the live object and a replace must keep.
async fn ensure<K, F>(api: &Api<K>, mut desired: K, retain: F) -> Result<()>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
    F: FnOnce(&K, &mut K),
{
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;

    match api.create(&PostParams::default(), &desired).await {
        Ok(_) => Ok(()),
        Err(err) if error::is_already_exists(&err) => {
            let current = api.get(&name).await?;
            desired.meta_mut().resource_version = current.meta().resource_version.clone();
            retain(&current, &mut desired);
            api.replace(&name, &PostParams::default(), &desired).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// The cluster IP is assigned on creation and immutable afterwards.
fn retain_cluster_ip(current: &Service, desired: &mut Service) {
    let assigned = current.spec.as_ref().and_then(|s| s.cluster_ip.clone());
    if let Some(spec) = desired.spec.as_mut() {
        spec.cluster_ip = assigned;
    }
}

/// Claim binding fields are immutable once the claim is bound.
fn retain_claim_binding(current: &PersistentVolumeClaim, desired: &mut PersistentVolumeClaim) {
    if let (Some(cur), Some(des)) = (current.spec.as_ref(), desired.spec.as_mut()) {
        des.volume_name = cur.volume_name.clone();
        des.storage_class_name = cur.storage_class_name.clone();
    }
}

/// Explicitly delete the resources that need synchronous teardown
/// confirmation. The config map and the claim are left to owner reference
/// garbage collection.
pub async fn teardown(client: &Client, nfs: &NfsServer) -> Result<()> {
    let namespace = namespace(nfs)?;
    let name = nfs.name_any();

    info!(name = %name, "Deleting dependent resources");

    let stateful_sets: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);
    delete_if_present(&stateful_sets, &name).await?;

    let services: Api<Service> = Api::namespaced(client.clone(), &namespace);
    delete_if_present(&services, &name).await?;

    Ok(())
}

/// Delete a resource, treating not-found as already deleted.
async fn delete_if_present<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(err) if error::is_not_found(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Compute the server status from the observed endpoint and workload.
/// Either resource being absent leaves the phase unknown; the remote
/// target carries the endpoint address whenever one is assigned.
pub fn derive_status(
    endpoint: Option<&Service>,
    workload: Option<&StatefulSet>,
) -> NfsServerStatus {
    let mut status = NfsServerStatus::default();

    if let Some(svc) = endpoint {
        if let Some(ip) = svc.spec.as_ref().and_then(|s| s.cluster_ip.as_deref()) {
            if !ip.is_empty() {
                status.remote_target = ip.to_string();
            }
        }
    }

    let workload = match (endpoint, workload) {
        (Some(_), Some(workload)) => workload,
        _ => return status,
    };

    // Both observed without error, so upgrade to Pending.
    status.phase = Phase::Pending;

    let ready = workload
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    if !status.remote_target.is_empty() && ready > 0 {
        status.phase = Phase::Running;
    }

    status
}

/// Fetch the current endpoint and workload and derive the status from
/// them. A missing resource is an expected observation; any other read
/// error propagates.
pub async fn observed_status(client: &Client, nfs: &NfsServer) -> Result<NfsServerStatus> {
    let namespace = namespace(nfs)?;
    let name = nfs.name_any();

    let services: Api<Service> = Api::namespaced(client.clone(), &namespace);
    let endpoint = services.get_opt(&name).await?;

    let stateful_sets: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);
    let workload = stateful_sets.get_opt(&name).await?;

    Ok(derive_status(endpoint.as_ref(), workload.as_ref()))
}

/// Persist a freshly derived status when it differs from the stored one,
/// broadcasting reachability changes of the remote target.
pub async fn update_status(
    client: &Client,
    recorder: &Recorder,
    nfs: &NfsServer,
    status: &NfsServerStatus,
) -> Result<()> {
    let current = nfs.status.clone().unwrap_or_default();
    if current == *status {
        return Ok(());
    }

    if current.remote_target.is_empty() != status.remote_target.is_empty() {
        if status.remote_target.is_empty() {
            publish(
                recorder,
                EventType::Warning,
                "ChangedStatus",
                "NFS server not listening",
            )
            .await;
        } else {
            publish(
                recorder,
                EventType::Normal,
                "ChangedStatus",
                &format!("NFS server is now functional at {}", status.remote_target),
            )
            .await;
        }
    }

    let namespace = namespace(nfs)?;
    let api: Api<NfsServer> = Api::namespaced(client.clone(), &namespace);
    api.patch_status(
        &nfs.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;

    Ok(())
}

/// Best-effort event broadcast. A failure to notify is logged and never
/// fails the reconcile that raised it.
pub async fn publish(recorder: &Recorder, type_: EventType, reason: &str, note: &str) {
    let event = Event {
        type_,
        reason: reason.to_string(),
        note: Some(note.to_string()),
        action: "Reconciling".to_string(),
        secondary: None,
    };
    if let Err(err) = recorder.publish(event).await {
        warn!(error = %err, "Failed to publish event");
    }
}

fn namespace(nfs: &NfsServer) -> Result<String> {
    nfs.namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))
}
