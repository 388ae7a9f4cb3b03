//! Translation between the virtual and the physical control plane
//!
//! - [`names`]: identity translation (virtual name → physical name)
//! - [`equality`]: semantic comparison used to detect real changes
//! - [`object`]: generic metadata shaping shared by every synced kind
//! - [`scope`]: ownership classification of physical objects

pub mod equality;
pub mod names;
pub mod object;
pub mod scope;

pub use equality::{capacity_eq, quantity_eq, semantic_eq};
pub use names::{
    physical_name, physical_name_cluster_scoped, safe_concat_name, translate_storage_class,
};
pub use object::ClusterObjectTranslator;
pub use scope::{MarkerLabelClassifier, OwnershipScope};

/// Prefix of every label and annotation key owned by the syncer
pub const RESERVED_PREFIX: &str = "vcluster.loft.sh/";

/// Label on physical objects naming the tenant instance that created them
pub const MARKER_LABEL: &str = "vcluster.loft.sh/managed-by";

/// Annotation on physical objects recording the virtual object's name
pub const OBJECT_NAME_ANNOTATION: &str = "vcluster.loft.sh/object-name";

/// Annotation on physical objects recording the virtual object's namespace
pub const OBJECT_NAMESPACE_ANNOTATION: &str = "vcluster.loft.sh/object-namespace";

/// Annotation on physical objects listing annotation keys copied from the
/// virtual object, newline separated
pub const MANAGED_ANNOTATIONS_ANNOTATION: &str = "vcluster.loft.sh/managed-annotations";

/// Back-reference on adopted virtual volumes naming the host volume
pub const HOST_PERSISTENT_VOLUME_ANNOTATION: &str = "vcluster.loft.sh/host-pv";

/// Value of [`MARKER_LABEL`] for a given target namespace and instance suffix
pub fn marker_value(target_namespace: &str, suffix: &str) -> String {
    safe_concat_name(&[target_namespace, "x", suffix])
}
