//! Sync Planner
//!
//! Decides, from the observed state of one identity pair, which translation
//! applies and what has to be written where.

use super::PersistentVolumeSyncer;
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use std::str::FromStr;

// =============================================================================
// Deletion Policy
// =============================================================================

/// What to do when one side of a pair disappears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Leave the surviving object alone
    #[default]
    Orphan,
    /// Delete managed host volumes whose virtual volume is gone
    DeletePhysical,
    /// Delete the surviving side in either direction
    Mirror,
}

impl DeletionPolicy {
    pub fn deletes_physical(self) -> bool {
        matches!(self, DeletionPolicy::DeletePhysical | DeletionPolicy::Mirror)
    }

    pub fn deletes_virtual(self) -> bool {
        matches!(self, DeletionPolicy::Mirror)
    }
}

impl std::fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionPolicy::Orphan => write!(f, "orphan"),
            DeletionPolicy::DeletePhysical => write!(f, "delete-physical"),
            DeletionPolicy::Mirror => write!(f, "mirror"),
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "orphan" => Ok(DeletionPolicy::Orphan),
            "delete-physical" | "delete_physical" => Ok(DeletionPolicy::DeletePhysical),
            "mirror" => Ok(DeletionPolicy::Mirror),
            other => Err(Error::Configuration(format!(
                "unknown deletion policy: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Sync Actions
// =============================================================================

/// A single write against one of the two control planes
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    CreatePhysical(PersistentVolume),
    CreateVirtual(PersistentVolume),
    UpdatePhysical(PersistentVolume),
    UpdateVirtual(PersistentVolume),
    DeletePhysical(String),
    DeleteVirtual(String),
}

impl SyncAction {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            SyncAction::CreatePhysical(_) => "create_physical",
            SyncAction::CreateVirtual(_) => "create_virtual",
            SyncAction::UpdatePhysical(_) => "update_physical",
            SyncAction::UpdateVirtual(_) => "update_virtual",
            SyncAction::DeletePhysical(_) => "delete_physical",
            SyncAction::DeleteVirtual(_) => "delete_virtual",
        }
    }
}

/// Observed state of one identity pair
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncState<'a> {
    pub virtual_pv: Option<&'a PersistentVolume>,
    pub physical: Option<&'a PersistentVolume>,
    /// Tenant claim bound to the host volume, if it could be resolved
    pub claim: Option<&'a PersistentVolumeClaim>,
}

fn is_deleting(pv: &PersistentVolume) -> bool {
    pv.metadata.deletion_timestamp.is_some()
}

fn is_bound(pv: &PersistentVolume) -> bool {
    pv.spec.as_ref().is_some_and(|s| s.claim_ref.is_some())
}

/// Plan the writes that bring the pair in sync. An empty plan means the
/// pair is settled.
///
/// Scheduling policy on top of the translation functions, which make no
/// such distinction:
///
/// - `translate_update` is only planned for managed host volumes. Adopted
///   (unmanaged) host volumes are read from but never written.
/// - Deletions follow `policy`; the default never deletes.
/// - Host-only volumes are adopted only once bound and their tenant claim
///   has been resolved.
pub fn plan(
    syncer: &PersistentVolumeSyncer,
    state: SyncState<'_>,
    policy: DeletionPolicy,
) -> Result<Vec<SyncAction>> {
    let mut actions = Vec::new();

    match (state.virtual_pv, state.physical) {
        (None, None) => {}

        (Some(vpv), None) => {
            if is_deleting(vpv) {
                return Ok(actions);
            }
            if syncer.is_adopted(vpv) {
                // The host volume it mirrored is gone
                if policy.deletes_virtual() {
                    if let Some(name) = vpv.metadata.name.clone() {
                        actions.push(SyncAction::DeleteVirtual(name));
                    }
                }
            } else {
                actions.push(SyncAction::CreatePhysical(syncer.translate(vpv)?));
            }
        }

        (None, Some(ppv)) => {
            if is_deleting(ppv) {
                return Ok(actions);
            }
            if syncer.scope(ppv).is_managed() {
                // Created for a virtual volume that no longer exists
                if policy.deletes_physical() {
                    if let Some(name) = ppv.metadata.name.clone() {
                        actions.push(SyncAction::DeletePhysical(name));
                    }
                }
            } else if is_bound(ppv) && state.claim.is_some() {
                actions.push(SyncAction::CreateVirtual(
                    syncer.translate_backwards(ppv, state.claim),
                ));
            }
        }

        (Some(vpv), Some(ppv)) => {
            if let Some(updated) = syncer.translate_update_backwards(vpv, ppv, state.claim) {
                actions.push(SyncAction::UpdateVirtual(updated));
            }
            // Unmanaged host volumes belong to the host; only read from them
            if syncer.scope(ppv).is_managed() {
                if let Some(updated) = syncer.translate_update(vpv, ppv) {
                    actions.push(SyncAction::UpdatePhysical(updated));
                }
            }
        }
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncerConfig;
    use crate::translate::HOST_PERSISTENT_VOLUME_ANNOTATION;
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolumeSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use std::collections::BTreeMap;

    fn syncer() -> PersistentVolumeSyncer {
        PersistentVolumeSyncer::from_config(&SyncerConfig::new("tenant-a"))
    }

    fn virtual_pv() -> PersistentVolume {
        PersistentVolume {
            metadata: ObjectMeta {
                name: Some("data-1".into()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                storage_class_name: Some("gold".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn host_pv(name: &str) -> PersistentVolume {
        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                storage_class_name: Some("standard".into()),
                claim_ref: Some(ObjectReference {
                    name: Some("c1-x-tenant-a-x-vcluster".into()),
                    namespace: Some("tenant-a".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn tenant_claim() -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("c1".into()),
                namespace: Some("tenant-a".into()),
                uid: Some("U1".into()),
                resource_version: Some("5".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_virtual_only_creates_physical() {
        let s = syncer();
        let vpv = virtual_pv();
        let actions = plan(
            &s,
            SyncState {
                virtual_pv: Some(&vpv),
                ..Default::default()
            },
            DeletionPolicy::Orphan,
        )
        .unwrap();

        assert_eq!(actions.len(), 1);
        assert_matches!(&actions[0], SyncAction::CreatePhysical(p) if p.spec.as_ref().unwrap().claim_ref.is_none());
    }

    #[test]
    fn test_deleting_virtual_is_left_alone() {
        let s = syncer();
        let mut vpv = virtual_pv();
        vpv.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        let actions = plan(
            &s,
            SyncState {
                virtual_pv: Some(&vpv),
                ..Default::default()
            },
            DeletionPolicy::Mirror,
        )
        .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_unmanaged_bound_host_volume_is_adopted() {
        let s = syncer();
        let ppv = host_pv("pvc-1234");
        let claim = tenant_claim();
        let actions = plan(
            &s,
            SyncState {
                physical: Some(&ppv),
                claim: Some(&claim),
                ..Default::default()
            },
            DeletionPolicy::Orphan,
        )
        .unwrap();

        assert_matches!(&actions[..], [SyncAction::CreateVirtual(v)] if s.is_adopted(v));
    }

    #[test]
    fn test_unclaimed_host_volume_is_ignored() {
        let s = syncer();
        let ppv = host_pv("pvc-1234");
        let actions = plan(
            &s,
            SyncState {
                physical: Some(&ppv),
                ..Default::default()
            },
            DeletionPolicy::Mirror,
        )
        .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_orphaned_managed_host_volume_follows_policy() {
        let s = syncer();
        let ppv = s.translate(&virtual_pv()).unwrap();
        let state = SyncState {
            physical: Some(&ppv),
            ..Default::default()
        };

        assert!(plan(&s, state, DeletionPolicy::Orphan).unwrap().is_empty());
        assert_matches!(
            &plan(&s, state, DeletionPolicy::DeletePhysical).unwrap()[..],
            [SyncAction::DeletePhysical(name)] if Some(name) == ppv.metadata.name.as_ref()
        );
    }

    #[test]
    fn test_adopted_virtual_without_host_follows_policy() {
        let s = syncer();
        let mut vpv = virtual_pv();
        vpv.metadata.annotations = Some(BTreeMap::from([(
            HOST_PERSISTENT_VOLUME_ANNOTATION.to_string(),
            "pvc-1234".to_string(),
        )]));
        let state = SyncState {
            virtual_pv: Some(&vpv),
            ..Default::default()
        };

        assert!(plan(&s, state, DeletionPolicy::DeletePhysical)
            .unwrap()
            .is_empty());
        assert_eq!(
            plan(&s, state, DeletionPolicy::Mirror).unwrap(),
            vec![SyncAction::DeleteVirtual("data-1".into())]
        );
    }

    #[test]
    fn test_unmanaged_host_volume_is_never_written() {
        let s = syncer();
        let ppv = host_pv("pvc-1234");
        let claim = tenant_claim();
        let vpv = s.translate_backwards(&ppv, Some(&claim));

        let mut changed = vpv.clone();
        changed.spec.as_mut().unwrap().mount_options = Some(vec!["noatime".into()]);

        let actions = plan(
            &s,
            SyncState {
                virtual_pv: Some(&changed),
                physical: Some(&ppv),
                claim: Some(&claim),
            },
            DeletionPolicy::Orphan,
        )
        .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_deletion_policy_parse() {
        assert_eq!("orphan".parse::<DeletionPolicy>().unwrap(), DeletionPolicy::Orphan);
        assert_eq!(
            "Delete-Physical".parse::<DeletionPolicy>().unwrap(),
            DeletionPolicy::DeletePhysical
        );
        assert_eq!(DeletionPolicy::Mirror.to_string(), "mirror");
        assert_matches!("sometimes".parse::<DeletionPolicy>(), Err(Error::Configuration(_)));
    }
}
