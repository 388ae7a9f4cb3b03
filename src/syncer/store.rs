//! Kubernetes-backed volume store
//!
//! Reads and writes volumes and claims on the virtual and the physical
//! control plane through two separate clients.

use crate::domain::ports::VolumeStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// Volume store over a virtual and a physical cluster client
#[derive(Clone)]
pub struct KubeVolumeStore {
    virtual_client: Client,
    physical_client: Client,
}

impl KubeVolumeStore {
    pub fn new(virtual_client: Client, physical_client: Client) -> Self {
        Self {
            virtual_client,
            physical_client,
        }
    }

    fn virtual_volumes(&self) -> Api<PersistentVolume> {
        Api::all(self.virtual_client.clone())
    }

    fn physical_volumes(&self) -> Api<PersistentVolume> {
        Api::all(self.physical_client.clone())
    }
}

fn volume_name(volume: &PersistentVolume) -> Result<&str> {
    volume
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::MissingField {
            kind: "PersistentVolume".to_string(),
            field: "metadata.name".to_string(),
        })
}

/// Deleting something that's already gone is success
async fn delete_ignoring_missing(api: &Api<PersistentVolume>, name: &str) -> Result<()> {
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(resp)) if resp.code == 404 => {
            debug!(volume = %name, "Volume already deleted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl VolumeStore for KubeVolumeStore {
    async fn get_virtual_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        Ok(self.virtual_volumes().get_opt(name).await?)
    }

    async fn get_physical_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        Ok(self.physical_volumes().get_opt(name).await?)
    }

    async fn list_physical_volumes(&self) -> Result<Vec<PersistentVolume>> {
        Ok(self
            .physical_volumes()
            .list(&ListParams::default())
            .await?
            .items)
    }

    async fn get_virtual_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> =
            Api::namespaced(self.virtual_client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_physical_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> =
            Api::namespaced(self.physical_client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_virtual_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        Ok(self
            .virtual_volumes()
            .create(&PostParams::default(), volume)
            .await?)
    }

    async fn create_physical_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        Ok(self
            .physical_volumes()
            .create(&PostParams::default(), volume)
            .await?)
    }

    async fn update_virtual_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        // Replace carries the resource version, so a stale snapshot fails with 409
        let name = volume_name(volume)?;
        Ok(self
            .virtual_volumes()
            .replace(name, &PostParams::default(), volume)
            .await?)
    }

    async fn update_physical_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let name = volume_name(volume)?;
        Ok(self
            .physical_volumes()
            .replace(name, &PostParams::default(), volume)
            .await?)
    }

    async fn delete_virtual_volume(&self, name: &str) -> Result<()> {
        delete_ignoring_missing(&self.virtual_volumes(), name).await
    }

    async fn delete_physical_volume(&self, name: &str) -> Result<()> {
        delete_ignoring_missing(&self.physical_volumes(), name).await
    }
}
