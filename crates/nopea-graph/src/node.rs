use crate::identity::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// A knowledge-graph node (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// The canonicalized name this node was addressed by.
    pub canonical_name: String,
    /// EWMA of confidence observations, always in `[0, 1]`.
    pub relevance: f64,
    pub observations: u64,
    pub first_seen: String,
    pub last_seen: String,
}
