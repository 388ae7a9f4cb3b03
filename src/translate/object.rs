//! Generic Object Translator
//!
//! Shapes any cluster-scoped virtual object into its host-cluster
//! counterpart: strips server-assigned metadata, substitutes the name, and
//! projects labels and annotations.

use super::names::{physical_name, physical_name_cluster_scoped};
use super::{
    marker_value, MANAGED_ANNOTATIONS_ANNOTATION, MARKER_LABEL, OBJECT_NAMESPACE_ANNOTATION,
    OBJECT_NAME_ANNOTATION, RESERVED_PREFIX,
};
use crate::domain::ports::ObjectTranslator;
use crate::error::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;

/// Object translator for the host cluster of a single tenant instance
#[derive(Debug, Clone)]
pub struct ClusterObjectTranslator {
    target_namespace: String,
    suffix: String,
}

impl ClusterObjectTranslator {
    pub fn new(target_namespace: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            suffix: suffix.into(),
        }
    }

    /// Physical name for a virtual object's metadata. Namespaced objects are
    /// flattened into the target namespace; cluster-scoped objects are
    /// isolated per target namespace.
    pub fn physical_name_for(&self, meta: &ObjectMeta) -> Option<String> {
        let name = meta.name.as_deref().filter(|n| !n.is_empty())?;
        Some(match meta.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => {
                physical_name(name, namespace, &self.suffix)
            }
            _ => physical_name_cluster_scoped(name, &self.target_namespace, &self.suffix),
        })
    }
}

fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Keys previously copied from the virtual object onto the physical one
fn managed_keys(physical: &ObjectMeta) -> Vec<&str> {
    physical
        .annotations
        .as_ref()
        .and_then(|a| a.get(MANAGED_ANNOTATIONS_ANNOTATION))
        .map(|v| v.lines().filter(|l| !l.is_empty()).collect())
        .unwrap_or_default()
}

/// Drop everything the API server assigns on its own
fn strip_server_metadata(meta: &mut ObjectMeta) {
    meta.uid = None;
    meta.resource_version = None;
    meta.managed_fields = None;
    meta.owner_references = None;
    meta.finalizers = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.generation = None;
    meta.generate_name = None;
    meta.self_link = None;
}

impl<K> ObjectTranslator<K> for ClusterObjectTranslator
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync,
{
    fn translate(&self, virtual_obj: &K) -> Result<K> {
        let vmeta = virtual_obj.meta();
        let name = self.physical_name_for(vmeta).ok_or_else(|| Error::Translation {
            kind: K::kind(&()).to_string(),
            name: vmeta.name.clone().unwrap_or_default(),
            reason: "virtual object has no name".to_string(),
        })?;

        let labels = self.translate_labels(virtual_obj);
        let annotations = self.translate_annotations(virtual_obj, virtual_obj);

        let mut physical = virtual_obj.clone();
        let meta = physical.meta_mut();
        strip_server_metadata(meta);
        meta.name = Some(name);
        meta.namespace = vmeta
            .namespace
            .as_ref()
            .map(|_| self.target_namespace.clone());
        meta.labels = Some(labels);
        meta.annotations = Some(annotations);

        Ok(physical)
    }

    fn translate_labels(&self, virtual_obj: &K) -> BTreeMap<String, String> {
        let mut labels: BTreeMap<String, String> = virtual_obj
            .meta()
            .labels
            .iter()
            .flatten()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.insert(
            MARKER_LABEL.to_string(),
            marker_value(&self.target_namespace, &self.suffix),
        );
        labels
    }

    fn translate_annotations(&self, virtual_obj: &K, physical_obj: &K) -> BTreeMap<String, String> {
        let vmeta = virtual_obj.meta();
        let pmeta = physical_obj.meta();

        // Keep annotations the host cluster added on its own, drop the ones we
        // copied last time so removals on the virtual side propagate.
        let previously_managed = managed_keys(pmeta);
        let mut annotations: BTreeMap<String, String> = pmeta
            .annotations
            .iter()
            .flatten()
            .filter(|(k, _)| !is_reserved(k) && !previously_managed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut copied = Vec::new();
        for (k, v) in vmeta.annotations.iter().flatten() {
            if is_reserved(k) {
                continue;
            }
            annotations.insert(k.clone(), v.clone());
            copied.push(k.as_str());
        }

        if !copied.is_empty() {
            annotations.insert(MANAGED_ANNOTATIONS_ANNOTATION.to_string(), copied.join("\n"));
        }
        if let Some(name) = &vmeta.name {
            annotations.insert(OBJECT_NAME_ANNOTATION.to_string(), name.clone());
        }
        if let Some(namespace) = &vmeta.namespace {
            annotations.insert(OBJECT_NAMESPACE_ANNOTATION.to_string(), namespace.clone());
        }
        annotations
    }
}
