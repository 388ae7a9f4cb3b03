//! Volume translation in both directions
//!
//! - [`PersistentVolumeSyncer::translate`]: virtual → new physical
//! - [`PersistentVolumeSyncer::translate_backwards`]: physical → new virtual
//! - [`PersistentVolumeSyncer::translate_update`]: patch for the physical side
//! - [`PersistentVolumeSyncer::translate_update_backwards`]: patch for the virtual side

use super::PersistentVolumeSyncer;
use crate::domain::ports::ObjectTranslator;
use crate::error::Result;
use crate::syncer::updated::Updated;
use crate::translate::{
    capacity_eq, semantic_eq, translate_storage_class, HOST_PERSISTENT_VOLUME_ANNOTATION,
};
use k8s_openapi::api::core::v1::{
    ObjectReference, PersistentVolume, PersistentVolumeClaim, PersistentVolumeSpec,
};
use std::collections::BTreeMap;

/// Generates comparison and copy helpers over the backend source fields of
/// a volume spec, i.e. every field that says where the data lives.
macro_rules! backend_source {
    ($($field:ident),* $(,)?) => {
        fn backend_source_eq(a: &PersistentVolumeSpec, b: &PersistentVolumeSpec) -> bool {
            true $(&& semantic_eq(&a.$field, &b.$field))*
        }

        fn copy_backend_source(from: &PersistentVolumeSpec, to: &mut PersistentVolumeSpec) {
            $(to.$field = from.$field.clone();)*
        }
    };
}

backend_source!(
    aws_elastic_block_store,
    azure_disk,
    azure_file,
    cephfs,
    cinder,
    csi,
    fc,
    flex_volume,
    flocker,
    gce_persistent_disk,
    glusterfs,
    host_path,
    iscsi,
    local,
    nfs,
    photon_persistent_disk,
    portworx_volume,
    quobyte,
    rbd,
    scale_io,
    storageos,
    vsphere_volume,
);

fn spec_mut(pv: &mut PersistentVolume) -> &mut PersistentVolumeSpec {
    pv.spec.get_or_insert_with(Default::default)
}

/// Claim reference carrying the tenant claim's identity in place of the
/// physical claim's. Kind, API version and field path are kept.
fn tenant_claim_ref(physical: &ObjectReference, claim: &PersistentVolumeClaim) -> ObjectReference {
    ObjectReference {
        name: claim.metadata.name.clone(),
        namespace: claim.metadata.namespace.clone(),
        resource_version: claim.metadata.resource_version.clone(),
        uid: claim.metadata.uid.clone(),
        ..physical.clone()
    }
}

impl PersistentVolumeSyncer {
    /// Build the host volume for a virtual volume.
    ///
    /// The claim reference is dropped: the host's binding controller binds
    /// the volume to the physical claim on its own.
    pub fn translate(&self, virtual_pv: &PersistentVolume) -> Result<PersistentVolume> {
        let mut physical = self.translator.translate(virtual_pv)?;

        let storage_class = translate_storage_class(
            &self.target_namespace,
            &self.suffix,
            virtual_pv
                .spec
                .as_ref()
                .and_then(|s| s.storage_class_name.as_deref()),
        );

        let spec = spec_mut(&mut physical);
        spec.claim_ref = None;
        spec.storage_class_name = storage_class;

        Ok(physical)
    }

    /// Build a virtual volume for a host volume that has no virtual
    /// counterpart yet.
    ///
    /// `claim` is the tenant claim bound to the volume, if any. Without one
    /// the claim reference is cleared, since the physical claim's identity
    /// means nothing to the tenant.
    pub fn translate_backwards(
        &self,
        physical: &PersistentVolume,
        claim: Option<&PersistentVolumeClaim>,
    ) -> PersistentVolume {
        let mut virtual_pv = physical.clone();
        virtual_pv.metadata.resource_version = None;
        virtual_pv.metadata.uid = None;
        virtual_pv.metadata.managed_fields = None;

        if let Some(spec) = virtual_pv.spec.as_mut() {
            spec.claim_ref = match (spec.claim_ref.as_ref(), claim) {
                (Some(claim_ref), Some(claim)) => Some(tenant_claim_ref(claim_ref, claim)),
                _ => None,
            };
        }

        virtual_pv
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(
                HOST_PERSISTENT_VOLUME_ANNOTATION.to_string(),
                physical.metadata.name.clone().unwrap_or_default(),
            );

        virtual_pv
    }

    /// Update for the host volume, or `None` when it already matches the
    /// virtual volume. The claim reference is never written in this
    /// direction.
    pub fn translate_update(
        &self,
        virtual_pv: &PersistentVolume,
        physical: &PersistentVolume,
    ) -> Option<PersistentVolume> {
        let empty = PersistentVolumeSpec::default();
        let vspec = virtual_pv.spec.as_ref().unwrap_or(&empty);
        let pspec = physical.spec.as_ref().unwrap_or(&empty);
        let mut updated = Updated::new(physical);

        if !backend_source_eq(pspec, vspec) {
            copy_backend_source(vspec, spec_mut(updated.get_mut()));
        }

        if !capacity_eq(pspec.capacity.as_ref(), vspec.capacity.as_ref()) {
            spec_mut(updated.get_mut()).capacity = vspec.capacity.clone();
        }

        if !semantic_eq(&pspec.access_modes, &vspec.access_modes) {
            spec_mut(updated.get_mut()).access_modes = vspec.access_modes.clone();
        }

        if !semantic_eq(
            &pspec.persistent_volume_reclaim_policy,
            &vspec.persistent_volume_reclaim_policy,
        ) {
            spec_mut(updated.get_mut()).persistent_volume_reclaim_policy =
                vspec.persistent_volume_reclaim_policy.clone();
        }

        let storage_class = translate_storage_class(
            &self.target_namespace,
            &self.suffix,
            vspec.storage_class_name.as_deref(),
        );
        if !semantic_eq(&pspec.storage_class_name, &storage_class) {
            spec_mut(updated.get_mut()).storage_class_name = storage_class;
        }

        if !semantic_eq(&pspec.node_affinity, &vspec.node_affinity) {
            spec_mut(updated.get_mut()).node_affinity = vspec.node_affinity.clone();
        }

        if !semantic_eq(&pspec.volume_mode, &vspec.volume_mode) {
            spec_mut(updated.get_mut()).volume_mode = vspec.volume_mode.clone();
        }

        if !semantic_eq(&pspec.mount_options, &vspec.mount_options) {
            spec_mut(updated.get_mut()).mount_options = vspec.mount_options.clone();
        }

        let annotations = Some(self.translator.translate_annotations(virtual_pv, physical));
        if !semantic_eq(&annotations, &physical.metadata.annotations) {
            updated.get_mut().metadata.annotations = annotations;
        }

        let labels = Some(self.translator.translate_labels(virtual_pv));
        if !semantic_eq(&labels, &physical.metadata.labels) {
            updated.get_mut().metadata.labels = labels;
        }

        updated.into_inner()
    }

    /// Update for the virtual volume, or `None` when it already reflects
    /// the host volume.
    ///
    /// The storage class only flows back for volumes this instance does not
    /// manage; for managed volumes it is a translation of the virtual value.
    /// An unbound host volume leaves the virtual claim reference alone.
    pub fn translate_update_backwards(
        &self,
        virtual_pv: &PersistentVolume,
        physical: &PersistentVolume,
        claim: Option<&PersistentVolumeClaim>,
    ) -> Option<PersistentVolume> {
        let empty = PersistentVolumeSpec::default();
        let vspec = virtual_pv.spec.as_ref().unwrap_or(&empty);
        let pspec = physical.spec.as_ref().unwrap_or(&empty);
        let mut updated = Updated::new(virtual_pv);

        if !self.scope(physical).is_managed()
            && !semantic_eq(&vspec.storage_class_name, &pspec.storage_class_name)
        {
            spec_mut(updated.get_mut()).storage_class_name = pspec.storage_class_name.clone();
        }

        if let (Some(claim_ref), Some(claim)) = (pspec.claim_ref.as_ref(), claim) {
            let claim_ref = Some(tenant_claim_ref(claim_ref, claim));
            if !semantic_eq(&vspec.claim_ref, &claim_ref) {
                spec_mut(updated.get_mut()).claim_ref = claim_ref;
            }
        }

        updated.into_inner()
    }
}
