//! End-to-end behaviour of the volume translation engine and reconciler

use k8s_openapi::api::core::v1::{
    ObjectReference, PersistentVolume, PersistentVolumeClaim, PersistentVolumeSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use volume_syncer::translate::{OBJECT_NAMESPACE_ANNOTATION, OBJECT_NAME_ANNOTATION};
use volume_syncer::{
    physical_name, physical_name_cluster_scoped, DeletionPolicy, MemoryVolumeStore,
    PersistentVolumeSyncer, SyncMetrics, SyncerConfig, VolumeReconciler,
};

fn syncer() -> PersistentVolumeSyncer {
    PersistentVolumeSyncer::from_config(&SyncerConfig::new("tenant-a"))
}

fn tenant_volume() -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some("data-1".into()),
            namespace: None,
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            storage_class_name: Some("gold".into()),
            capacity: Some(BTreeMap::from([(
                "storage".to_string(),
                Quantity("5Gi".into()),
            )])),
            access_modes: Some(vec!["ReadWriteOnce".into()]),
            claim_ref: None,
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

fn host_claim_ref() -> ObjectReference {
    ObjectReference {
        kind: Some("PersistentVolumeClaim".into()),
        api_version: Some("v1".into()),
        name: Some(physical_name("c1", "tenant-a", "vcluster")),
        namespace: Some("tenant-a".into()),
        uid: Some("HOST-U".into()),
        resource_version: Some("1234".into()),
        ..Default::default()
    }
}

#[test]
fn forward_then_bind_then_sync_back() {
    let s = syncer();
    let vpv = tenant_volume();

    let ppv = s.translate(&vpv).unwrap();
    let pspec = ppv.spec.as_ref().unwrap();
    assert_eq!(pspec.claim_ref, None);
    assert_eq!(
        pspec.storage_class_name.as_deref(),
        Some(physical_name_cluster_scoped("gold", "tenant-a", "vcluster").as_str())
    );

    // The host binds the volume to the physical claim
    let mut bound = ppv.clone();
    bound.spec.as_mut().unwrap().claim_ref = Some(host_claim_ref());

    let updated = s
        .translate_update_backwards(&vpv, &bound, Some(&tenant_claim()))
        .expect("claim reference must sync back");
    let claim_ref = updated.spec.as_ref().unwrap().claim_ref.as_ref().unwrap();
    assert_eq!(claim_ref.name.as_deref(), Some("c1"));
    assert_eq!(claim_ref.namespace.as_deref(), Some("tenant-a"));
    assert_eq!(claim_ref.uid.as_deref(), Some("U1"));
    assert_eq!(claim_ref.resource_version.as_deref(), Some("5"));

    // Both directions settle once the writes are applied
    assert_eq!(
        s.translate_update_backwards(&updated, &bound, Some(&tenant_claim())),
        None
    );
    assert_eq!(s.translate_update(&updated, &bound), None);
}

#[test]
fn claim_binding_on_host_never_flows_forward() {
    let s = syncer();
    let vpv = tenant_volume();
    let mut ppv = s.translate(&vpv).unwrap();

    ppv.spec.as_mut().unwrap().claim_ref = Some(host_claim_ref());
    assert_eq!(s.translate_update(&vpv, &ppv), None);
}

#[test]
fn physical_names_do_not_collide() {
    let names: HashSet<String> = (0..1000)
        .map(|i| physical_name(&format!("vol-{}", i % 37), &format!("ns-{}", i / 37), "vcluster"))
        .collect();
    assert_eq!(names.len(), 1000);
}

#[tokio::test]
async fn reconciler_round_trip_through_store() {
    let store = Arc::new(MemoryVolumeStore::new());
    let reconciler = VolumeReconciler::new(
        syncer(),
        store.clone(),
        DeletionPolicy::Orphan,
        SyncMetrics::new().unwrap(),
    );

    store.put_virtual_volume(tenant_volume());
    store.put_virtual_claim(tenant_claim());

    let outcome = reconciler.reconcile_virtual("data-1").await.unwrap();
    assert_eq!(outcome.actions, vec!["create_physical"]);

    // Host-side binding: the physical claim points back at the tenant claim
    let pname = physical_name_cluster_scoped("data-1", "tenant-a", "vcluster");
    let claim_name = physical_name("c1", "tenant-a", "vcluster");
    store.put_physical_claim(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(claim_name),
            namespace: Some("tenant-a".into()),
            annotations: Some(BTreeMap::from([
                (OBJECT_NAME_ANNOTATION.to_string(), "c1".to_string()),
                (OBJECT_NAMESPACE_ANNOTATION.to_string(), "tenant-a".to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    });
    let mut host = store.physical_volume(&pname).unwrap();
    host.spec.as_mut().unwrap().claim_ref = Some(host_claim_ref());
    store.put_physical_volume(host);

    let outcome = reconciler.reconcile_virtual("data-1").await.unwrap();
    assert_eq!(outcome.actions, vec!["update_virtual"]);

    let synced = store.virtual_volume("data-1").unwrap();
    let claim_ref = synced.spec.unwrap().claim_ref.unwrap();
    assert_eq!(claim_ref.uid.as_deref(), Some("U1"));

    // Tenant resizes; only the host volume changes
    let mut resized = store.virtual_volume("data-1").unwrap();
    resized.spec.as_mut().unwrap().capacity = Some(BTreeMap::from([(
        "storage".to_string(),
        Quantity("10Gi".into()),
    )]));
    store.put_virtual_volume(resized);

    let outcome = reconciler.reconcile_physical(&pname).await.unwrap();
    assert_eq!(outcome.actions, vec!["update_physical"]);
    assert_eq!(
        store.physical_volume(&pname).unwrap().spec.unwrap().capacity.unwrap()["storage"],
        Quantity("10Gi".into())
    );

    assert!(reconciler.reconcile_virtual("data-1").await.unwrap().is_noop());
}
