//! Domain Ports - Core trait definitions for the volume syncer
//!
//! These traits define the boundaries between the pure translation engine
//! and the systems around it. Adapters implement these traits to provide
//! concrete functionality; tests plug in in-memory versions.

use crate::error::Result;
use crate::translate::OwnershipScope;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

// =============================================================================
// Object Translator Port
// =============================================================================

/// Generic shaping of a virtual object into its physical counterpart.
///
/// Covers what every synced kind shares: metadata stripping, name
/// substitution, and the label/annotation projection.
pub trait ObjectTranslator<K>: Send + Sync {
    /// Build the physical shell of a virtual object
    fn translate(&self, virtual_obj: &K) -> Result<K>;

    /// Labels the physical object should carry
    fn translate_labels(&self, virtual_obj: &K) -> BTreeMap<String, String>;

    /// Annotations the physical object should carry, given its current state
    fn translate_annotations(&self, virtual_obj: &K, physical_obj: &K) -> BTreeMap<String, String>;
}

// =============================================================================
// Ownership Scope Port
// =============================================================================

/// Decides whether a physical object was created for a given tenant
/// namespace by this syncer instance.
pub trait ScopeClassifier: Send + Sync {
    fn is_managed(&self, target_namespace: &str, physical: &ObjectMeta) -> bool;

    fn scope(&self, target_namespace: &str, physical: &ObjectMeta) -> OwnershipScope {
        if self.is_managed(target_namespace, physical) {
            OwnershipScope::Managed
        } else {
            OwnershipScope::Unmanaged
        }
    }
}

// =============================================================================
// Volume Store Port
// =============================================================================

/// Read/write access to volumes and claims on both control planes
#[async_trait]
pub trait VolumeStore: Send + Sync {
    async fn get_virtual_volume(&self, name: &str) -> Result<Option<PersistentVolume>>;

    async fn get_physical_volume(&self, name: &str) -> Result<Option<PersistentVolume>>;

    async fn list_physical_volumes(&self) -> Result<Vec<PersistentVolume>>;

    async fn get_virtual_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>>;

    async fn get_physical_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>>;

    async fn create_virtual_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume>;

    async fn create_physical_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume>;

    async fn update_virtual_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume>;

    async fn update_physical_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume>;

    async fn delete_virtual_volume(&self, name: &str) -> Result<()>;

    async fn delete_physical_volume(&self, name: &str) -> Result<()>;
}

// =============================================================================
// Pod Exec Port
// =============================================================================

/// Runs a command inside a container and returns its stdout
#[async_trait]
pub trait PodExecutor: Send + Sync {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<Vec<u8>>;
}
