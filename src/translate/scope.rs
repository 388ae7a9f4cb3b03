//! Ownership Scope
//!
//! Whether a physical object was created by this syncer for a tenant
//! namespace ("managed") or exists on the host independently ("unmanaged").

use super::{marker_value, MARKER_LABEL};
use crate::domain::ports::ScopeClassifier;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Ownership classification of a physical object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipScope {
    Managed,
    Unmanaged,
}

impl OwnershipScope {
    pub fn is_managed(self) -> bool {
        matches!(self, OwnershipScope::Managed)
    }
}

impl std::fmt::Display for OwnershipScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnershipScope::Managed => write!(f, "managed"),
            OwnershipScope::Unmanaged => write!(f, "unmanaged"),
        }
    }
}

/// Classifies objects by the marker label the object translator stamps on
/// everything it creates.
#[derive(Debug, Clone)]
pub struct MarkerLabelClassifier {
    suffix: String,
}

impl MarkerLabelClassifier {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl ScopeClassifier for MarkerLabelClassifier {
    fn is_managed(&self, target_namespace: &str, physical: &ObjectMeta) -> bool {
        physical
            .labels
            .as_ref()
            .and_then(|labels| labels.get(MARKER_LABEL))
            .is_some_and(|value| *value == marker_value(target_namespace, &self.suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta_with_marker(value: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some("pv-1".into()),
            labels: value.map(|v| BTreeMap::from([(MARKER_LABEL.to_string(), v.to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn test_managed_only_for_own_namespace() {
        let classifier = MarkerLabelClassifier::new("vcluster");
        let marker = marker_value("tenant-a", "vcluster");

        assert!(classifier.is_managed("tenant-a", &meta_with_marker(Some(&marker))));
        assert!(!classifier.is_managed("tenant-b", &meta_with_marker(Some(&marker))));
        assert!(!classifier.is_managed("tenant-a", &meta_with_marker(None)));
        assert_eq!(classifier.scope("tenant-a", &meta_with_marker(None)), OwnershipScope::Unmanaged);
    }
}
