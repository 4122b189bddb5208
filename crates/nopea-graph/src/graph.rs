use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
pub use petgraph::Direction;
use thiserror::Error;

use crate::identity::{canonicalize, node_id, NodeId, NodeKind};
use crate::node::Node;
use crate::relationship::{Relation, Relationship};

/// EWMA smoothing factor (spec.md §4.2, §9 — fixed, not configurable).
pub const ALPHA: f64 = 0.3;

/// Edge weights below this threshold are pruned by [`Graph::decay_all`]
/// (spec.md §4.2).
pub const WEIGHT_PRUNE_THRESHOLD: f64 = 0.05;

/// Nodes below this relevance with no incident relationship are pruned
/// by [`Graph::decay_all`] (spec.md §4.2).
pub const RELEVANCE_PRUNE_THRESHOLD: f64 = 0.01;

fn ewma(confidence: f64, previous: f64) -> f64 {
    (ALPHA * confidence + (1.0 - ALPHA) * previous).clamp(0.0, 1.0)
}

#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("node {0} does not exist in the graph")]
    UnknownNode(NodeId),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A content-addressed, weighted knowledge graph (spec.md §3, §4.2).
///
/// Backed by `petgraph`'s `StableDiGraph` so that removing nodes or
/// edges during decay never invalidates the indices the identity maps
/// hold for everything else — the same property the Python-derived
/// `ConversationKGMemory` graph in this codebase's memory crate relies
/// on `petgraph` for, just with stable indices instead of plain ones.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableDiGraph<Node, Relationship>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<(NodeId, Relation, NodeId), EdgeIndex>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from a flat node/relationship list — the shape
    /// a snapshot decodes into (spec.md §4.3, §9).
    #[must_use]
    pub fn from_parts(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            let idx = graph.inner.add_node(node.clone());
            graph.node_index.insert(node.id, idx);
        }
        for rel in relationships {
            let (Some(&src), Some(&dst)) = (
                graph.node_index.get(&rel.source_id),
                graph.node_index.get(&rel.target_id),
            ) else {
                // A snapshot referencing a node that doesn't exist is
                // malformed; drop the dangling edge rather than panic
                // (spec.md §9: "never trust a snapshot that yields
                // unexpected shape").
                continue;
            };
            let key = rel.key();
            let eidx = graph.inner.add_edge(src, dst, rel);
            graph.edge_index.insert(key, eidx);
        }
        graph
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.inner.edge_count()
    }

    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&idx| &self.inner[idx])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_weights()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.inner.edge_weights()
    }

    /// `upsert_node(kind, name, confidence, marker)` (spec.md §4.2).
    pub fn upsert_node(&mut self, kind: NodeKind, name: &str, confidence: f64, marker: &str) -> Node {
        let canonical = canonicalize(kind, name);
        let id = node_id(kind, &canonical);

        if let Some(&idx) = self.node_index.get(&id) {
            let existing = &mut self.inner[idx];
            existing.relevance = ewma(confidence, existing.relevance);
            existing.observations += 1;
            existing.last_seen = marker.to_string();
            existing.clone()
        } else {
            let node = Node {
                id: id.clone(),
                kind,
                canonical_name: canonical,
                relevance: 0.5,
                observations: 1,
                first_seen: marker.to_string(),
                last_seen: marker.to_string(),
            };
            let idx = self.inner.add_node(node.clone());
            self.node_index.insert(id, idx);
            node
        }
    }

    /// `upsert_relationship(source_id, relation, target_id, confidence,
    /// marker, evidence)` (spec.md §4.2). Both endpoints must already
    /// exist (callers upsert nodes before relationships, per the
    /// ingestor's mapping rules in spec.md §4.4).
    pub fn upsert_relationship(
        &mut self,
        source_id: &str,
        relation: Relation,
        target_id: &str,
        confidence: f64,
        marker: &str,
        evidence: impl Into<String>,
    ) -> Result<Relationship> {
        let key = (source_id.to_string(), relation.clone(), target_id.to_string());

        if let Some(&eidx) = self.edge_index.get(&key) {
            let existing = &mut self.inner[eidx];
            existing.weight = ewma(confidence, existing.weight);
            existing.observations += 1;
            existing.last_seen = marker.to_string();
            existing.evidence.push(evidence.into());
            return Ok(existing.clone());
        }

        let src = *self
            .node_index
            .get(source_id)
            .ok_or_else(|| Error::UnknownNode(source_id.to_string()))?;
        let dst = *self
            .node_index
            .get(target_id)
            .ok_or_else(|| Error::UnknownNode(target_id.to_string()))?;

        // New relationships start at weight 0.5, identical to the node
        // rule: the first observation establishes the baseline before
        // any EWMA pull.
        let rel = Relationship {
            source_id: source_id.to_string(),
            relation,
            target_id: target_id.to_string(),
            weight: 0.5,
            observations: 1,
            first_seen: marker.to_string(),
            last_seen: marker.to_string(),
            evidence: vec![evidence.into()],
        };
        let eidx = self.inner.add_edge(src, dst, rel.clone());
        self.edge_index.insert(key, eidx);
        Ok(rel)
    }

    /// Outgoing or incoming relationships for a node (spec.md §4.2).
    #[must_use]
    pub fn neighbors(&self, node_id: &str, direction: Direction) -> Vec<Relationship> {
        let Some(&idx) = self.node_index.get(node_id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, direction)
            .map(|edge| edge.weight().clone())
            .collect()
    }

    /// `decay_all(factor)` (spec.md §4.2): scale every relevance/weight
    /// by `factor`, then prune weak edges and orphaned nodes.
    pub fn decay_all(&mut self, factor: f64) {
        let factor = factor.clamp(0.0, 1.0);

        for weight in self.inner.node_weights_mut() {
            weight.relevance = (weight.relevance * factor).clamp(0.0, 1.0);
        }
        for weight in self.inner.edge_weights_mut() {
            weight.weight = (weight.weight * factor).clamp(0.0, 1.0);
        }

        let stale_edges: Vec<(EdgeIndex, (NodeId, Relation, NodeId))> = self
            .edge_index
            .iter()
            .filter_map(|(key, &eidx)| {
                let weight = self.inner.edge_weight(eidx)?.weight;
                (weight < WEIGHT_PRUNE_THRESHOLD).then(|| (eidx, key.clone()))
            })
            .collect();
        for (eidx, key) in stale_edges {
            self.inner.remove_edge(eidx);
            self.edge_index.remove(&key);
        }

        let orphan_nodes: Vec<(NodeIndex, NodeId)> = self
            .node_index
            .iter()
            .filter_map(|(id, &idx)| {
                let node = self.inner.node_weight(idx)?;
                let has_incident = self.inner.edges_directed(idx, Direction::Outgoing).next().is_some()
                    || self.inner.edges_directed(idx, Direction::Incoming).next().is_some();
                (node.relevance < RELEVANCE_PRUNE_THRESHOLD && !has_incident).then(|| (idx, id.clone()))
            })
            .collect();
        for (idx, id) in orphan_nodes {
            self.inner.remove_node(idx);
            self.node_index.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_node_creates_with_relevance_half() {
        let mut g = Graph::new();
        let n = g.upsert_node(NodeKind::Concept, "checkout", 0.9, "m1");
        assert_eq!(n.relevance, 0.5);
        assert_eq!(n.observations, 1);
    }

    #[test]
    fn upsert_node_follows_ewma_recurrence() {
        let mut g = Graph::new();
        g.upsert_node(NodeKind::Concept, "checkout", 0.9, "m1");
        let n = g.upsert_node(NodeKind::Concept, "checkout", 0.9, "m2");
        assert!((n.relevance - (0.3 * 0.9 + 0.7 * 0.5)).abs() < 1e-9);
        assert_eq!(n.observations, 2);
    }

    #[test]
    fn repeated_upserts_collapse_to_one_node() {
        let mut g = Graph::new();
        for i in 0..5 {
            g.upsert_node(NodeKind::Concept, "checkout", 0.8, &format!("m{i}"));
        }
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.get_node(&crate::identity::node_id(NodeKind::Concept, "checkout")).unwrap().observations, 5);
    }

    #[test]
    fn relevance_and_weight_stay_in_unit_interval() {
        let mut g = Graph::new();
        let n1 = g.upsert_node(NodeKind::Concept, "a", 1.5, "m1"); // out-of-range confidence
        assert!((0.0..=1.0).contains(&n1.relevance));
        let n2 = g.upsert_node(NodeKind::Concept, "b", -1.0, "m1");
        assert!((0.0..=1.0).contains(&n2.relevance));
    }

    #[test]
    fn upsert_relationship_requires_existing_nodes() {
        let mut g = Graph::new();
        let err = g
            .upsert_relationship("missing-a", Relation::DependsOn, "missing-b", 0.5, "m1", "ev")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
    }

    #[test]
    fn upsert_relationship_appends_evidence_without_overwriting() {
        let mut g = Graph::new();
        let a = g.upsert_node(NodeKind::Concept, "svc", 0.9, "m1");
        let b = g.upsert_node(NodeKind::Concept, "namespace:prod", 0.5, "m1");
        g.upsert_relationship(&a.id, Relation::DeployedTo, &b.id, 0.9, "m1", "first").unwrap();
        let rel = g
            .upsert_relationship(&a.id, Relation::DeployedTo, &b.id, 0.9, "m2", "second")
            .unwrap();
        assert_eq!(rel.evidence, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(rel.observations, 2);
    }

    #[test]
    fn decay_all_zero_then_prune_empties_the_graph() {
        let mut g = Graph::new();
        let a = g.upsert_node(NodeKind::Concept, "svc", 0.9, "m1");
        let b = g.upsert_node(NodeKind::Concept, "namespace:prod", 0.5, "m1");
        g.upsert_relationship(&a.id, Relation::DeployedTo, &b.id, 0.9, "m1", "ev").unwrap();

        g.decay_all(0.0);

        assert_eq!(g.node_count(), 0);
        assert_eq!(g.relationship_count(), 0);
    }

    #[test]
    fn decay_keeps_nodes_with_surviving_edges_alive() {
        let mut g = Graph::new();
        let a = g.upsert_node(NodeKind::Concept, "svc", 0.9, "m1");
        let b = g.upsert_node(NodeKind::Concept, "namespace:prod", 0.9, "m1");
        g.upsert_relationship(&a.id, Relation::DeployedTo, &b.id, 0.95, "m1", "ev").unwrap();

        // 0.95 weight decayed once at 0.98 stays above the prune floor.
        g.decay_all(0.98);

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.relationship_count(), 1);
    }

    #[test]
    fn neighbors_filters_by_direction() {
        let mut g = Graph::new();
        let a = g.upsert_node(NodeKind::Concept, "svc", 0.9, "m1");
        let b = g.upsert_node(NodeKind::Concept, "namespace:prod", 0.5, "m1");
        g.upsert_relationship(&a.id, Relation::DeployedTo, &b.id, 0.9, "m1", "ev").unwrap();

        assert_eq!(g.neighbors(&a.id, Direction::Outgoing).len(), 1);
        assert_eq!(g.neighbors(&a.id, Direction::Incoming).len(), 0);
        assert_eq!(g.neighbors(&b.id, Direction::Incoming).len(), 1);
    }

    #[test]
    fn from_parts_round_trips() {
        let mut g = Graph::new();
        let a = g.upsert_node(NodeKind::Concept, "svc", 0.9, "m1");
        let b = g.upsert_node(NodeKind::Error, "crash", 0.8, "m1");
        g.upsert_relationship(&a.id, Relation::Breaks, &b.id, 0.8, "m1", "ev").unwrap();

        let nodes: Vec<_> = g.nodes().cloned().collect();
        let rels: Vec<_> = g.relationships().cloned().collect();
        let rebuilt = Graph::from_parts(nodes, rels);

        assert_eq!(rebuilt.node_count(), 2);
        assert_eq!(rebuilt.relationship_count(), 1);
    }
}
