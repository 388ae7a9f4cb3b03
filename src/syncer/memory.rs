//! In-memory volume store
//!
//! Behaves like a pair of API servers for volumes and claims: assigns uids
//! and resource versions on write and rejects updates carrying a stale
//! resource version with a 409, the way the real API does.

use crate::domain::ports::VolumeStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::error::ErrorResponse;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Plane {
    volumes: RwLock<BTreeMap<String, PersistentVolume>>,
    claims: RwLock<BTreeMap<(String, String), PersistentVolumeClaim>>,
}

/// Volume store holding both planes in memory
#[derive(Default)]
pub struct MemoryVolumeStore {
    virtual_plane: Plane,
    physical_plane: Plane,
    revision: AtomicU64,
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

impl MemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Seed or overwrite a virtual volume, bypassing version checks
    pub fn put_virtual_volume(&self, volume: PersistentVolume) -> PersistentVolume {
        self.put_volume(&self.virtual_plane, volume)
    }

    /// Seed or overwrite a physical volume, bypassing version checks
    pub fn put_physical_volume(&self, volume: PersistentVolume) -> PersistentVolume {
        self.put_volume(&self.physical_plane, volume)
    }

    pub fn put_virtual_claim(&self, claim: PersistentVolumeClaim) -> PersistentVolumeClaim {
        self.put_claim(&self.virtual_plane, claim)
    }

    pub fn put_physical_claim(&self, claim: PersistentVolumeClaim) -> PersistentVolumeClaim {
        self.put_claim(&self.physical_plane, claim)
    }

    pub fn virtual_volume(&self, name: &str) -> Option<PersistentVolume> {
        self.virtual_plane.volumes.read().get(name).cloned()
    }

    pub fn physical_volume(&self, name: &str) -> Option<PersistentVolume> {
        self.physical_plane.volumes.read().get(name).cloned()
    }

    fn put_volume(&self, plane: &Plane, mut volume: PersistentVolume) -> PersistentVolume {
        let name = volume.metadata.name.clone().unwrap_or_default();
        let uid = volume
            .metadata
            .uid
            .clone()
            .unwrap_or_else(|| format!("uid-{}", name));
        volume.metadata.uid = Some(uid);
        volume.metadata.resource_version = Some(self.next_revision());
        plane.volumes.write().insert(name, volume.clone());
        volume
    }

    fn put_claim(&self, plane: &Plane, mut claim: PersistentVolumeClaim) -> PersistentVolumeClaim {
        let namespace = claim.metadata.namespace.clone().unwrap_or_default();
        let name = claim.metadata.name.clone().unwrap_or_default();
        if claim.metadata.uid.is_none() {
            claim.metadata.uid = Some(format!("uid-{}-{}", namespace, name));
        }
        if claim.metadata.resource_version.is_none() {
            claim.metadata.resource_version = Some(self.next_revision());
        }
        plane.claims.write().insert((namespace, name), claim.clone());
        claim
    }

    fn create(&self, plane: &Plane, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let name = volume.metadata.name.clone().unwrap_or_default();
        if plane.volumes.read().contains_key(&name) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("persistentvolumes \"{}\" already exists", name),
            ));
        }
        let mut volume = volume.clone();
        volume.metadata.uid = None;
        Ok(self.put_volume(plane, volume))
    }

    fn update(&self, plane: &Plane, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let name = volume.metadata.name.clone().unwrap_or_default();
        let mut volumes = plane.volumes.write();
        let current = volumes.get(&name).ok_or_else(|| {
            api_error(
                404,
                "NotFound",
                format!("persistentvolumes \"{}\" not found", name),
            )
        })?;
        if volume.metadata.resource_version != current.metadata.resource_version {
            return Err(api_error(
                409,
                "Conflict",
                format!(
                    "Operation cannot be fulfilled on persistentvolumes \"{}\": the object has been modified",
                    name
                ),
            ));
        }
        let mut volume = volume.clone();
        volume.metadata.uid = current.metadata.uid.clone();
        volume.metadata.resource_version = Some(self.next_revision());
        volumes.insert(name, volume.clone());
        Ok(volume)
    }
}

#[async_trait]
impl VolumeStore for MemoryVolumeStore {
    async fn get_virtual_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        Ok(self.virtual_volume(name))
    }

    async fn get_physical_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        Ok(self.physical_volume(name))
    }

    async fn list_physical_volumes(&self) -> Result<Vec<PersistentVolume>> {
        Ok(self.physical_plane.volumes.read().values().cloned().collect())
    }

    async fn get_virtual_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self
            .virtual_plane
            .claims
            .read()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_physical_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self
            .physical_plane
            .claims
            .read()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_virtual_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        self.create(&self.virtual_plane, volume)
    }

    async fn create_physical_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        self.create(&self.physical_plane, volume)
    }

    async fn update_virtual_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        self.update(&self.virtual_plane, volume)
    }

    async fn update_physical_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        self.update(&self.physical_plane, volume)
    }

    async fn delete_virtual_volume(&self, name: &str) -> Result<()> {
        self.virtual_plane.volumes.write().remove(name);
        Ok(())
    }

    async fn delete_physical_volume(&self, name: &str) -> Result<()> {
        self.physical_plane.volumes.write().remove(name);
        Ok(())
    }
}
