//! PersistentVolume Syncer
//!
//! Keeps a tenant's virtual `PersistentVolume` and its host-cluster
//! counterpart in step. The translation functions are pure: they take
//! snapshots of both sides and return the object to create, the update to
//! write, or `None` when nothing changed.
//!
//! Field ownership:
//!
//! | field                         | owner    |
//! |-------------------------------|----------|
//! | backend source, capacity, access modes, reclaim policy, node affinity, volume mode, mount options, labels, annotations | virtual  |
//! | storage class                 | virtual for managed volumes, physical otherwise |
//! | claim reference               | physical (identifiers substituted per side) |

pub mod planner;
pub mod translate;

pub use planner::{plan, DeletionPolicy, SyncAction, SyncState};

use crate::config::SyncerConfig;
use crate::domain::ports::{ObjectTranslator, ScopeClassifier};
use crate::translate::{
    physical_name_cluster_scoped, ClusterObjectTranslator, MarkerLabelClassifier,
    OwnershipScope, HOST_PERSISTENT_VOLUME_ANNOTATION, OBJECT_NAME_ANNOTATION,
};
use k8s_openapi::api::core::v1::PersistentVolume;
use std::sync::Arc;

/// Translation engine for one tenant instance
#[derive(Clone)]
pub struct PersistentVolumeSyncer {
    target_namespace: String,
    suffix: String,
    translator: Arc<dyn ObjectTranslator<PersistentVolume>>,
    classifier: Arc<dyn ScopeClassifier>,
}

impl std::fmt::Debug for PersistentVolumeSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentVolumeSyncer")
            .field("target_namespace", &self.target_namespace)
            .field("suffix", &self.suffix)
            .finish_non_exhaustive()
    }
}

impl PersistentVolumeSyncer {
    pub fn new(
        target_namespace: impl Into<String>,
        suffix: impl Into<String>,
        translator: Arc<dyn ObjectTranslator<PersistentVolume>>,
        classifier: Arc<dyn ScopeClassifier>,
    ) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            suffix: suffix.into(),
            translator,
            classifier,
        }
    }

    /// Syncer wired with the default object translator and marker-label
    /// classifier
    pub fn from_config(config: &SyncerConfig) -> Self {
        Self::new(
            config.target_namespace.clone(),
            config.suffix.clone(),
            Arc::new(ClusterObjectTranslator::new(
                config.target_namespace.clone(),
                config.suffix.clone(),
            )),
            Arc::new(MarkerLabelClassifier::new(config.suffix.clone())),
        )
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Ownership scope of a physical volume for this tenant
    pub fn scope(&self, physical: &PersistentVolume) -> OwnershipScope {
        self.classifier
            .scope(&self.target_namespace, &physical.metadata)
    }

    /// Whether a virtual volume was adopted from the host cluster
    pub fn is_adopted(&self, virtual_pv: &PersistentVolume) -> bool {
        host_volume_annotation(virtual_pv).is_some()
    }

    /// Name of the host volume backing a virtual volume
    pub fn physical_volume_name(&self, virtual_pv: &PersistentVolume) -> Option<String> {
        if let Some(host) = host_volume_annotation(virtual_pv) {
            return Some(host.to_string());
        }
        virtual_pv
            .metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|n| physical_name_cluster_scoped(n, &self.target_namespace, &self.suffix))
    }

    /// Name the virtual counterpart of a host volume has (or would have)
    pub fn virtual_volume_name(&self, physical: &PersistentVolume) -> Option<String> {
        if self.scope(physical).is_managed() {
            if let Some(name) = physical
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(OBJECT_NAME_ANNOTATION))
            {
                return Some(name.clone());
            }
        }
        // Adopted volumes keep their host name
        physical.metadata.name.clone()
    }
}

fn host_volume_annotation(pv: &PersistentVolume) -> Option<&str> {
    pv.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(HOST_PERSISTENT_VOLUME_ANNOTATION))
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}
