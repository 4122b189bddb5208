//! Content addressing for knowledge-graph nodes (spec.md §3): identity
//! is a 16-byte BLAKE2b digest of `(kind, canonical_name)`, hex-encoded.

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};

type Blake2b128 = Blake2b<U16>;

/// Node kind. Only `concept` and `error` are required by the deploy
/// memory (spec.md §3); the set is otherwise closed for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Concept,
    Error,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Error => "error",
        }
    }
}

/// A node identifier: a 32-character lowercase hex string.
pub type NodeId = String;

/// Canonicalize a name for a given kind: `error` names are lowercased,
/// `concept` names are preserved verbatim (spec.md §3).
#[must_use]
pub fn canonicalize(kind: NodeKind, name: &str) -> String {
    match kind {
        NodeKind::Error => name.to_lowercase(),
        NodeKind::Concept => name.to_string(),
    }
}

/// Deterministic id for `(kind, canonical_name)`. Identical inputs
/// always hash to identical ids, so repeated ingestion of the same
/// entity collapses onto one node (spec.md §3 invariant).
#[must_use]
pub fn node_id(kind: NodeKind, canonical_name: &str) -> NodeId {
    let mut hasher = Blake2b128::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_name.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_and_name_collapse_to_one_id() {
        let a = node_id(NodeKind::Concept, &canonicalize(NodeKind::Concept, "checkout"));
        let b = node_id(NodeKind::Concept, &canonicalize(NodeKind::Concept, "checkout"));
        assert_eq!(a, b);
    }

    #[test]
    fn error_names_are_canonicalized_lowercase() {
        let a = node_id(NodeKind::Error, &canonicalize(NodeKind::Error, "CrashLoopBackOff"));
        let b = node_id(NodeKind::Error, &canonicalize(NodeKind::Error, "crashloopbackoff"));
        assert_eq!(a, b);
    }

    #[test]
    fn concept_names_are_case_sensitive() {
        let a = node_id(NodeKind::Concept, &canonicalize(NodeKind::Concept, "Checkout"));
        let b = node_id(NodeKind::Concept, &canonicalize(NodeKind::Concept, "checkout"));
        assert_ne!(a, b);
    }

    #[test]
    fn different_kinds_with_same_name_differ() {
        let a = node_id(NodeKind::Concept, "timeout");
        let b = node_id(NodeKind::Error, "timeout");
        assert_ne!(a, b);
    }

    #[test]
    fn id_is_32_hex_chars() {
        let id = node_id(NodeKind::Concept, "checkout");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
