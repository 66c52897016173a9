//! NfsServer controller
//!
//! Watches NfsServer resources and their owned dependents and triggers
//! reconciliation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        events::EventType,
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::controllers::Context;
use crate::crd::{NfsServer, Phase};
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::nfs_server::{self as reconciler, Lifecycle};

/// Run the NfsServer controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<NfsServer> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("NfsServer CRD not installed: {}", e);
        return;
    }

    info!("Starting NfsServer controller");

    Controller::new(api, WatcherConfig::default())
        .owns(Api::<Service>::all(client.clone()), WatcherConfig::default())
        .owns(Api::<ConfigMap>::all(client.clone()), WatcherConfig::default())
        .owns(
            Api::<PersistentVolumeClaim>::all(client.clone()),
            WatcherConfig::default(),
        )
        .owns(Api::<StatefulSet>::all(client.clone()), WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled NfsServer"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&["NfsServer"]).inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %nfs.name_any(), namespace = nfs.namespace()))]
async fn reconcile(nfs: Arc<NfsServer>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["NfsServer"])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&["NfsServer"]).inc();

    let namespace = nfs.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<NfsServer> = Api::namespaced(ctx.client.clone(), &namespace);

    match Lifecycle::of(&nfs) {
        Lifecycle::Unregistered => {
            // Nothing may be deployed until the deletion guard is durable;
            // the finalizer write re-delivers the object for the deploy
            // pass.
            reconciler::register_finalizer(&api, &nfs).await?;
            Ok(Action::await_change())
        }
        Lifecycle::Active => apply(&nfs, &ctx).await,
        Lifecycle::Terminating => cleanup(&api, &nfs, &ctx).await,
        Lifecycle::Released => Ok(Action::await_change()),
    }
}

/// Deploy reconciliation (create/update)
async fn apply(nfs: &NfsServer, ctx: &Context) -> Result<Action> {
    let recorder = ctx.recorder(nfs);

    if let Err(e) = reconciler::validate(nfs) {
        warn!(error = %e, "Rejecting malformed spec");
        reconciler::publish(&recorder, EventType::Warning, "InvalidSpec", &e.to_string()).await;
        return Err(e);
    }

    if let Err(e) = reconciler::deploy(&ctx.client, nfs).await {
        // Stale-version conflicts resolve themselves once the refreshed
        // object is redelivered; everything else is worth a warning.
        if !e.is_conflict() {
            reconciler::publish(&recorder, EventType::Warning, "FailedCreation", &e.to_string())
                .await;
        }
        return Err(e);
    }

    let status = reconciler::observed_status(&ctx.client, nfs).await?;
    reconciler::update_status(&ctx.client, &recorder, nfs, &status).await?;

    let requeue = if status.phase == Phase::Running { 300 } else { 60 };
    Ok(Action::requeue(Duration::from_secs(requeue)))
}

/// Cleanup when the resource is being deleted
async fn cleanup(api: &Api<NfsServer>, nfs: &NfsServer, ctx: &Context) -> Result<Action> {
    let recorder = ctx.recorder(nfs);
    reconciler::publish(
        &recorder,
        EventType::Normal,
        "Terminating",
        "Deleting all the resources...",
    )
    .await;

    reconciler::teardown(&ctx.client, nfs).await?;
    reconciler::release_finalizer(api, nfs).await?;

    metrics::CLEANUPS.with_label_values(&["NfsServer"]).inc();

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(nfs: Arc<NfsServer>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_conflict() {
        debug!(name = %nfs.name_any(), "Version conflict, awaiting redelivery");
        return Action::requeue(Duration::from_secs(5));
    }

    error!(
        name = %nfs.name_any(),
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    let requeue_duration = match error {
        Error::Validation(_) => Duration::from_secs(300),
        Error::Kube(_) => Duration::from_secs(30),
        _ => Duration::from_secs(30),
    };

    Action::requeue(requeue_duration)
}
