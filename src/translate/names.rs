//! Identity Translation
//!
//! Deterministic mapping of tenant-side identities onto the flat,
//! cluster-scoped name space of the host cluster.

use sha2::{Digest, Sha256};

/// Maximum length of a Kubernetes object name we emit
pub const MAX_NAME_LENGTH: usize = 63;

/// Prefix kept from an over-long name before the hash suffix
const TRUNCATED_PREFIX_LENGTH: usize = 52;

/// Number of hex characters of the digest appended to truncated names
const HASH_SUFFIX_LENGTH: usize = 10;

/// Separator segment between name components
const SEPARATOR: &str = "x";

/// Prefix for cluster-scoped objects synced to the host cluster
const CLUSTER_SCOPED_PREFIX: &str = "vcluster";

/// Join `parts` with `-`, shortening the result to [`MAX_NAME_LENGTH`]
/// by replacing the tail with a digest of the full name.
pub fn safe_concat_name<S: AsRef<str>>(parts: &[S]) -> String {
    let full = parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<&str>>()
        .join("-");
    if full.len() <= MAX_NAME_LENGTH {
        return full;
    }

    let digest = Sha256::digest(full.as_bytes());
    let hash = digest.iter().fold(String::with_capacity(64), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
        s
    });

    // Object names are ASCII, but never split a multi-byte char
    let mut cut = TRUNCATED_PREFIX_LENGTH;
    while !full.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}-{}", &full[..cut], &hash[..HASH_SUFFIX_LENGTH])
}

/// Physical name of a namespaced tenant object.
///
/// Empty names stay empty. Segments are joined with `-x-` and not escaped,
/// so the mapping is only injective while names do not themselves contain
/// `-x-`: `("a-x-b", "c")` and `("a", "b-x-c")` map to the same name.
pub fn physical_name(name: &str, namespace: &str, suffix: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    safe_concat_name(&[name, SEPARATOR, namespace, SEPARATOR, suffix])
}

/// Physical name of a cluster-scoped tenant object, isolated per target
/// namespace so tenants sharing a host cluster never collide.
///
/// Empty names stay empty.
pub fn physical_name_cluster_scoped(name: &str, target_namespace: &str, suffix: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    safe_concat_name(&[
        CLUSTER_SCOPED_PREFIX,
        name,
        SEPARATOR,
        target_namespace,
        SEPARATOR,
        suffix,
    ])
}

/// Translate an optional storage class name. `None` and `""` both mean
/// "no storage class" and map to `None`.
pub fn translate_storage_class(
    target_namespace: &str,
    suffix: &str,
    storage_class: Option<&str>,
) -> Option<String> {
    match storage_class {
        None | Some("") => None,
        Some(name) => Some(physical_name_cluster_scoped(name, target_namespace, suffix)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_physical_name_format() {
        assert_eq!(
            physical_name("data-1", "tenant-a", "vcluster"),
            "data-1-x-tenant-a-x-vcluster"
        );
        assert_eq!(
            physical_name_cluster_scoped("gold", "tenant-a", "vcluster"),
            "vcluster-gold-x-tenant-a-x-vcluster"
        );
    }

    #[test]
    fn test_empty_name_stays_empty() {
        assert_eq!(physical_name("", "tenant-a", "vcluster"), "");
        assert_eq!(physical_name_cluster_scoped("", "tenant-a", "vcluster"), "");
        assert_eq!(translate_storage_class("tenant-a", "vcluster", Some("")), None);
        assert_eq!(translate_storage_class("tenant-a", "vcluster", None), None);
    }

    #[test]
    fn test_long_names_are_hashed() {
        let long = "a".repeat(80);
        let name = physical_name(&long, "tenant-a", "vcluster");

        assert_eq!(name.len(), TRUNCATED_PREFIX_LENGTH + 1 + HASH_SUFFIX_LENGTH);
        assert!(name.len() <= MAX_NAME_LENGTH);
        assert!(name.starts_with(&"a".repeat(TRUNCATED_PREFIX_LENGTH)));

        // Same input, same output
        assert_eq!(name, physical_name(&long, "tenant-a", "vcluster"));

        // Differing only past the truncation point still yields distinct names
        let other = physical_name(&long, "tenant-b", "vcluster");
        assert_ne!(name, other);
    }

    #[test]
    fn test_name_mapping_is_injective() {
        let mut seen = HashSet::new();
        for i in 0..40 {
            for j in 0..25 {
                let namespace = format!("tenant-{}", i);
                let name = format!("volume-{}", j);
                assert!(seen.insert(physical_name(&name, &namespace, "vcluster")));
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_separator_inside_segment_collides() {
        assert_eq!(
            physical_name("a-x-b", "c", "vcluster"),
            physical_name("a", "b-x-c", "vcluster")
        );
        assert_ne!(
            physical_name("a-b", "c", "vcluster"),
            physical_name("a", "b-c", "vcluster")
        );
    }

    #[test]
    fn test_storage_class_isolated_per_namespace() {
        let a = translate_storage_class("tenant-a", "vcluster", Some("gold"));
        let b = translate_storage_class("tenant-b", "vcluster", Some("gold"));
        assert!(a.is_some());
        assert_ne!(a, b);
    }
}
