//! Content-addressed, weighted knowledge graph (spec.md §3, §4.2).
//!
//! Nodes are addressed by `(kind, canonical_name)` via a BLAKE2b
//! digest; relationships are typed, directed, weighted edges keyed by
//! `(source_id, relation, target_id)`. Reinforcement uses an
//! exponentially weighted moving average and the whole graph can be
//! decayed and pruned in one pass.

pub mod graph;
pub mod identity;
pub mod node;
pub mod relationship;

pub use graph::{Direction, Error, Graph, Result, ALPHA, RELEVANCE_PRUNE_THRESHOLD, WEIGHT_PRUNE_THRESHOLD};
pub use identity::{canonicalize, node_id, NodeId, NodeKind};
pub use node::Node;
pub use relationship::{Relation, Relationship};
