use crate::normalize::normalize;
use nopea_core::Manifest;
use sha2::{Digest, Sha256};

/// `hash(M) = hash(M')` whenever `M'` differs from `M` only by fields
/// the normalizer strips (spec.md §4.8).
#[must_use]
pub fn hash(manifest: &Manifest) -> String {
    let normalized = normalize(manifest);
    // serde_json's Value serialization is already compact (no
    // pretty-printer applied); this is the "compact JSON encoding"
    // the hash is defined over.
    let compact = serde_json::to_vec(&normalized).unwrap_or_default();
    let digest = Sha256::digest(&compact);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_stable_across_volatile_noise() {
        let a = json!({"kind": "ConfigMap", "metadata": {"name": "x"}});
        let b = json!({"kind": "ConfigMap", "metadata": {"name": "x", "resourceVersion": "42"}});
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn hash_differs_for_meaningful_change() {
        let a = json!({"kind": "ConfigMap", "metadata": {"name": "x"}, "data": {"k": "1"}});
        let b = json!({"kind": "ConfigMap", "metadata": {"name": "x"}, "data": {"k": "2"}});
        assert_ne!(hash(&a), hash(&b));
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let h = hash(&json!({"kind": "ConfigMap"}));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
