//! Controller wiring
//!
//! Drives the [`VolumeReconciler`] from a `kube` runtime controller over
//! virtual volumes, plus a periodic sweep over host volumes so volumes that
//! only exist on the host get adopted.

use crate::error::{Error, ErrorAction};
use crate::syncer::reconciler::VolumeReconciler;
use futures::StreamExt;
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Backoff used for errors that ask for one
const ERROR_BACKOFF: Duration = Duration::from_secs(15);

/// Shared state handed to every reconciliation
pub struct Context {
    pub reconciler: VolumeReconciler,
    pub resync_interval: Duration,
}

impl Context {
    pub fn new(reconciler: VolumeReconciler, resync_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            reconciler,
            resync_interval,
        })
    }
}

/// Reconcile one virtual volume and its host counterpart
pub async fn reconcile(volume: Arc<PersistentVolume>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = volume.name_any();
    let outcome = ctx.reconciler.reconcile_virtual(&name).await?;
    if !outcome.is_noop() {
        info!(volume = %name, actions = ?outcome.actions, "Volume pair synced");
    }
    Ok(Action::requeue(ctx.resync_interval))
}

/// Map an error to a requeue decision
pub fn error_policy(volume: Arc<PersistentVolume>, error: &Error, ctx: Arc<Context>) -> Action {
    ctx.reconciler.metrics().record_error(error);
    warn!(
        volume = %volume.name_any(),
        error = %error,
        conflict = error.is_conflict(),
        retryable = error.is_retryable(),
        "Volume reconciliation error"
    );
    requeue_action(error.action())
}

fn requeue_action(action: ErrorAction) -> Action {
    match action {
        ErrorAction::RequeueWithBackoff => Action::requeue(ERROR_BACKOFF),
        ErrorAction::RequeueAfter(after) => Action::requeue(after),
        ErrorAction::NoRequeue => Action::await_change(),
    }
}

/// Run the virtual volume controller until shutdown
pub async fn run_controller(volumes: Api<PersistentVolume>, ctx: Arc<Context>) {
    info!("Starting persistent volume controller");

    Controller::new(volumes, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(volume = %object.name, ?action, "Reconciliation completed");
                }
                Err(e) => {
                    error!(error = %e, "Controller error");
                }
            }
        })
        .await;
}

/// Periodically reconcile every host volume
pub async fn run_physical_sweep(ctx: Arc<Context>) {
    let mut interval = tokio::time::interval(ctx.resync_interval);
    loop {
        interval.tick().await;
        match ctx.reconciler.sweep_physical().await {
            Ok(count) => debug!(volumes = count, "Host volume sweep completed"),
            Err(e) => {
                ctx.reconciler.metrics().record_error(&e);
                warn!(error = %e, "Host volume sweep failed");
            }
        }
    }
}
