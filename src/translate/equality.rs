//! Semantic Equality
//!
//! Structural comparison of resource sub-fields. Two values are
//! semantically equal when they only differ in ways the API server does not
//! care about: unset versus empty collections, and resource quantities
//! written with different suffixes (`1Gi` versus `1024Mi`).

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Compare two serializable values after normalization.
///
/// Values that fail to serialize are never considered equal, so the caller
/// falls through to a write instead of silently skipping one.
pub fn semantic_eq<T: Serialize + ?Sized>(a: &T, b: &T) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => normalize(a) == normalize(b),
        _ => false,
    }
}

/// Compare two capacity maps by quantity value rather than by spelling.
pub fn capacity_eq(
    a: Option<&BTreeMap<String, Quantity>>,
    b: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let a = a.unwrap_or(&empty);
    let b = b.unwrap_or(&empty);

    a.len() == b.len()
        && a.iter().all(|(resource, qa)| match b.get(resource) {
            Some(qb) => quantity_eq(qa, qb),
            None => false,
        })
}

/// Compare two quantities by value. Unparseable quantities fall back to
/// comparing their string form.
pub fn quantity_eq(a: &Quantity, b: &Quantity) -> bool {
    match (ParsedQuantity::parse(&a.0), ParsedQuantity::parse(&b.0)) {
        (Some(pa), Some(pb)) => pa.same_value(&pb).unwrap_or(a.0 == b.0),
        _ => a.0 == b.0,
    }
}

/// Drop nulls, empty arrays and empty objects so that "unset" and "empty"
/// compare equal. An entirely empty value normalizes to `Null`.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: serde_json::Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                Value::Null
            } else {
                // Positional: keep nulls so element order is preserved
                Value::Array(items.into_iter().map(normalize).collect())
            }
        }
        other => other,
    }
}

// =============================================================================
// Quantity Parsing
// =============================================================================

/// Exact rational value of a quantity: `numerator / denominator`
#[derive(Debug, Clone, Copy)]
struct ParsedQuantity {
    numerator: i128,
    denominator: i128,
}

impl ParsedQuantity {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (negative, rest) = match raw.as_bytes().first()? {
            b'-' => (true, &raw[1..]),
            b'+' => (false, &raw[1..]),
            _ => (false, raw),
        };

        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);
        if number.is_empty() || number == "." {
            return None;
        }

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        let digits = format!("{}{}", int_part, frac_part);
        let mut numerator: i128 = digits.parse().ok()?;
        let mut exp10: i32 = -(frac_part.len() as i32);
        let mut exp2: u32 = 0;

        match suffix {
            "" => {}
            "Ki" => exp2 = 10,
            "Mi" => exp2 = 20,
            "Gi" => exp2 = 30,
            "Ti" => exp2 = 40,
            "Pi" => exp2 = 50,
            "Ei" => exp2 = 60,
            "n" => exp10 -= 9,
            "u" => exp10 -= 6,
            "m" => exp10 -= 3,
            "k" => exp10 += 3,
            "M" => exp10 += 6,
            "G" => exp10 += 9,
            "T" => exp10 += 12,
            "P" => exp10 += 15,
            "E" => exp10 += 18,
            s if s.starts_with('e') || s.starts_with('E') => {
                exp10 = exp10.checked_add(s[1..].parse::<i32>().ok()?)?;
            }
            _ => return None,
        }

        numerator = numerator.checked_mul(1i128.checked_shl(exp2)?)?;
        let mut denominator: i128 = 1;
        if exp10 >= 0 {
            numerator = numerator.checked_mul(10i128.checked_pow(exp10 as u32)?)?;
        } else {
            denominator = 10i128.checked_pow(exp10.unsigned_abs())?;
        }
        if negative {
            numerator = -numerator;
        }

        Some(Self {
            numerator,
            denominator,
        })
    }

    /// `None` when the cross product overflows
    fn same_value(&self, other: &Self) -> Option<bool> {
        let left = self.numerator.checked_mul(other.denominator)?;
        let right = other.numerator.checked_mul(self.denominator)?;
        Some(left == right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ObjectReference, VolumeNodeAffinity};

    fn q(s: &str) -> Quantity {
        Quantity(s.to_string())
    }

    #[test]
    fn test_quantity_equivalent_spellings() {
        assert!(quantity_eq(&q("1Gi"), &q("1024Mi")));
        assert!(quantity_eq(&q("1.5Gi"), &q("1536Mi")));
        assert!(quantity_eq(&q("1k"), &q("1000")));
        assert!(quantity_eq(&q("1e3"), &q("1k")));
        assert!(quantity_eq(&q("500m"), &q("0.5")));
        assert!(!quantity_eq(&q("1G"), &q("1Gi")));
        assert!(!quantity_eq(&q("10Gi"), &q("20Gi")));
    }

    #[test]
    fn test_unparseable_quantity_compares_as_string() {
        assert!(quantity_eq(&q("lots"), &q("lots")));
        assert!(!quantity_eq(&q("lots"), &q("1Gi")));
    }

    #[test]
    fn test_extreme_exponent_does_not_overflow() {
        assert!(!quantity_eq(&q("1.5e-2147483648"), &q("1")));
        assert!(!quantity_eq(&q("1e2147483647"), &q("1")));
        assert!(quantity_eq(&q("1.5e-2147483648"), &q("1.5e-2147483648")));
        assert!(ParsedQuantity::parse("1.5e-2147483648").is_none());
    }

    #[test]
    fn test_capacity_maps() {
        let a = BTreeMap::from([("storage".to_string(), q("10Gi"))]);
        let b = BTreeMap::from([("storage".to_string(), q("10240Mi"))]);
        let c = BTreeMap::from([("storage".to_string(), q("5Gi"))]);

        assert!(capacity_eq(Some(&a), Some(&b)));
        assert!(!capacity_eq(Some(&a), Some(&c)));
        assert!(!capacity_eq(Some(&a), None));
        assert!(capacity_eq(None, Some(&BTreeMap::new())));
    }

    #[test]
    fn test_unset_and_empty_are_equal() {
        let none: Option<BTreeMap<String, String>> = None;
        let empty = Some(BTreeMap::<String, String>::new());
        assert!(semantic_eq(&none, &empty));

        let no_options: Option<Vec<String>> = None;
        assert!(semantic_eq(&no_options, &Some(vec![])));
        assert!(!semantic_eq(&no_options, &Some(vec!["ro".to_string()])));

        let no_affinity: Option<VolumeNodeAffinity> = None;
        assert!(semantic_eq(&no_affinity, &Some(VolumeNodeAffinity::default())));
    }

    #[test]
    fn test_object_reference_differences_detected() {
        let a = ObjectReference {
            name: Some("c1".into()),
            namespace: Some("tenant-a".into()),
            uid: Some("U1".into()),
            ..Default::default()
        };
        let mut b = a.clone();
        assert!(semantic_eq(&a, &b));

        b.uid = Some("U2".into());
        assert!(!semantic_eq(&a, &b));
    }

    #[test]
    fn test_list_order_matters() {
        let a = vec!["ReadWriteOnce".to_string(), "ReadOnlyMany".to_string()];
        let b = vec!["ReadOnlyMany".to_string(), "ReadWriteOnce".to_string()];
        assert!(!semantic_eq(&a, &b));
    }
}
