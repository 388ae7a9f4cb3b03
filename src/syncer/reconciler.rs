//! Volume Reconciler
//!
//! Fetches both sides of an identity pair, resolves the tenant claim, runs
//! the planner and applies the resulting writes.

use crate::domain::ports::VolumeStore;
use crate::error::Result;
use crate::syncer::locks::PairLocks;
use crate::syncer::metrics::SyncMetrics;
use crate::syncer::persistentvolumes::{
    plan, DeletionPolicy, PersistentVolumeSyncer, SyncAction, SyncState,
};
use crate::translate::{
    marker_value, physical_name_cluster_scoped, MARKER_LABEL, OBJECT_NAMESPACE_ANNOTATION,
    OBJECT_NAME_ANNOTATION,
};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of reconciling one pair
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Labels of the writes performed, in order
    pub actions: Vec<&'static str>,
    pub synced_at: DateTime<Utc>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Applies sync plans through a [`VolumeStore`]
#[derive(Clone)]
pub struct VolumeReconciler {
    syncer: PersistentVolumeSyncer,
    store: Arc<dyn VolumeStore>,
    policy: DeletionPolicy,
    metrics: SyncMetrics,
    locks: PairLocks,
}

impl VolumeReconciler {
    pub fn new(
        syncer: PersistentVolumeSyncer,
        store: Arc<dyn VolumeStore>,
        policy: DeletionPolicy,
        metrics: SyncMetrics,
    ) -> Self {
        Self {
            syncer,
            store,
            policy,
            metrics,
            locks: PairLocks::new(),
        }
    }

    pub fn syncer(&self) -> &PersistentVolumeSyncer {
        &self.syncer
    }

    pub fn store(&self) -> &Arc<dyn VolumeStore> {
        &self.store
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    /// Per-pair locks shared by every clone of this reconciler
    pub fn locks(&self) -> &PairLocks {
        &self.locks
    }

    /// Reconcile the pair keyed by a virtual volume name
    pub async fn reconcile_virtual(&self, name: &str) -> Result<SyncOutcome> {
        let _pair = self.locks.lock(name).await;
        let virtual_pv = self.store.get_virtual_volume(name).await?;
        let physical_name = match &virtual_pv {
            Some(vpv) => self.syncer.physical_volume_name(vpv),
            None => Some(physical_name_cluster_scoped(
                name,
                self.syncer.target_namespace(),
                self.syncer.suffix(),
            )),
        };
        let physical = match physical_name {
            Some(pname) => self.store.get_physical_volume(&pname).await?,
            None => None,
        };

        self.sync(virtual_pv, physical).await
    }

    /// Reconcile the pair keyed by a host volume name.
    ///
    /// The first read only finds the pair key; both sides are read again
    /// once the pair is locked.
    pub async fn reconcile_physical(&self, name: &str) -> Result<SyncOutcome> {
        let virtual_name = self
            .store
            .get_physical_volume(name)
            .await?
            .and_then(|ppv| self.syncer.virtual_volume_name(&ppv))
            .unwrap_or_else(|| name.to_string());

        let _pair = self.locks.lock(&virtual_name).await;
        let physical = self.store.get_physical_volume(name).await?;
        let virtual_pv = self.store.get_virtual_volume(&virtual_name).await?;

        self.sync(virtual_pv, physical).await
    }

    /// Reconcile every host volume once
    pub async fn sweep_physical(&self) -> Result<usize> {
        let volumes = self.store.list_physical_volumes().await?;
        let mut synced = 0;
        for volume in &volumes {
            let Some(name) = volume.metadata.name.as_deref() else {
                continue;
            };
            match self.reconcile_physical(name).await {
                Ok(_) => synced += 1,
                Err(e) => {
                    self.metrics.record_error(&e);
                    warn!(volume = %name, error = %e, "Host volume sync failed");
                }
            }
        }
        Ok(synced)
    }

    /// Tenant claim bound to a host volume, found through the object-name
    /// annotations on the physical claim.
    ///
    /// Only claims in this tenant's target namespace count. A host volume or
    /// claim carrying another instance's marker label never resolves.
    async fn resolve_claim(&self, physical: &PersistentVolume) -> Result<Option<PersistentVolumeClaim>> {
        let marker = marker_value(self.syncer.target_namespace(), self.syncer.suffix());
        if has_foreign_marker(physical.metadata.labels.as_ref(), &marker) {
            return Ok(None);
        }

        let Some(claim_ref) = physical.spec.as_ref().and_then(|s| s.claim_ref.as_ref()) else {
            return Ok(None);
        };
        let (Some(namespace), Some(name)) = (claim_ref.namespace.as_deref(), claim_ref.name.as_deref())
        else {
            return Ok(None);
        };
        if namespace != self.syncer.target_namespace() {
            return Ok(None);
        }

        let Some(physical_claim) = self.store.get_physical_claim(namespace, name).await? else {
            debug!(namespace = %namespace, claim = %name, "Bound host claim not found");
            return Ok(None);
        };
        if has_foreign_marker(physical_claim.metadata.labels.as_ref(), &marker) {
            return Ok(None);
        }

        let annotations = physical_claim.metadata.annotations.as_ref();
        let virtual_name = annotations.and_then(|a| a.get(OBJECT_NAME_ANNOTATION));
        let virtual_namespace = annotations.and_then(|a| a.get(OBJECT_NAMESPACE_ANNOTATION));
        match (virtual_namespace, virtual_name) {
            (Some(ns), Some(n)) => self.store.get_virtual_claim(ns, n).await,
            // Claim doesn't belong to this tenant
            _ => Ok(None),
        }
    }

    async fn sync(
        &self,
        virtual_pv: Option<PersistentVolume>,
        physical: Option<PersistentVolume>,
    ) -> Result<SyncOutcome> {
        let started = Instant::now();
        let claim = match &physical {
            Some(ppv) => self.resolve_claim(ppv).await?,
            None => None,
        };

        let state = SyncState {
            virtual_pv: virtual_pv.as_ref(),
            physical: physical.as_ref(),
            claim: claim.as_ref(),
        };
        let actions = plan(&self.syncer, state, self.policy)?;

        let mut applied = Vec::with_capacity(actions.len());
        for action in actions {
            let label = action.label();
            self.apply(action).await?;
            self.metrics.record_action(label);
            applied.push(label);
        }

        self.metrics
            .observe_duration(started.elapsed().as_secs_f64());
        Ok(SyncOutcome {
            actions: applied,
            synced_at: Utc::now(),
        })
    }

    async fn apply(&self, action: SyncAction) -> Result<()> {
        match action {
            SyncAction::CreatePhysical(pv) => {
                let created = self.store.create_physical_volume(&pv).await?;
                info!(volume = ?created.metadata.name, "Created host volume");
            }
            SyncAction::CreateVirtual(pv) => {
                let created = self.store.create_virtual_volume(&pv).await?;
                info!(volume = ?created.metadata.name, "Adopted host volume into virtual cluster");
            }
            SyncAction::UpdatePhysical(pv) => {
                self.store.update_physical_volume(&pv).await?;
                debug!(volume = ?pv.metadata.name, "Updated host volume");
            }
            SyncAction::UpdateVirtual(pv) => {
                self.store.update_virtual_volume(&pv).await?;
                debug!(volume = ?pv.metadata.name, "Updated virtual volume");
            }
            SyncAction::DeletePhysical(name) => {
                self.store.delete_physical_volume(&name).await?;
                info!(volume = %name, "Deleted host volume without virtual counterpart");
            }
            SyncAction::DeleteVirtual(name) => {
                self.store.delete_virtual_volume(&name).await?;
                info!(volume = %name, "Deleted virtual volume without host counterpart");
            }
        }
        Ok(())
    }
}

/// Labelled as created by a different tenant instance
fn has_foreign_marker(labels: Option<&BTreeMap<String, String>>, marker: &str) -> bool {
    labels
        .and_then(|l| l.get(MARKER_LABEL))
        .is_some_and(|value| value != marker)
}
