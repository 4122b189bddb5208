//! Read-only query rules over the knowledge graph (spec.md §4.5).

use nopea_core::{Dependency, FailurePattern};
use nopea_graph::{Direction, Graph, Relation};

/// Outgoing `breaks` relationships for `service_id`, sorted by
/// confidence descending.
#[must_use]
pub fn failure_patterns(graph: &Graph, service_id: &str) -> Vec<FailurePattern> {
    let mut patterns: Vec<FailurePattern> = graph
        .neighbors(service_id, Direction::Outgoing)
        .into_iter()
        .filter(|rel| rel.relation == Relation::Breaks)
        .map(|rel| {
            let error = graph
                .get_node(&rel.target_id)
                .map(|n| n.canonical_name.clone())
                .unwrap_or(rel.target_id);
            FailurePattern {
                error,
                confidence: rel.weight,
                observations: rel.observations,
                evidence: rel.evidence,
            }
        })
        .collect();
    patterns.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    patterns
}

/// Outgoing `depends_on` relationships for `service_id`.
#[must_use]
pub fn dependencies(graph: &Graph, service_id: &str) -> Vec<Dependency> {
    graph
        .neighbors(service_id, Direction::Outgoing)
        .into_iter()
        .filter(|rel| rel.relation == Relation::DependsOn)
        .map(|rel| {
            let target_name = graph
                .get_node(&rel.target_id)
                .map(|n| n.canonical_name.clone())
                .unwrap_or(rel.target_id);
            Dependency {
                target_name,
                weight: rel.weight,
                observations: rel.observations,
            }
        })
        .collect()
}

const RECOMMENDATION_CONFIDENCE_THRESHOLD: f64 = 0.7;
const RECOMMENDATION_MIN_OBSERVATIONS: u64 = 2;

/// A human-readable canary suggestion for every failure pattern
/// confident and frequent enough to worry about (spec.md §4.5).
#[must_use]
pub fn recommendations(graph: &Graph, service_id: &str) -> Vec<String> {
    failure_patterns(graph, service_id)
        .into_iter()
        .filter(|p| p.confidence > RECOMMENDATION_CONFIDENCE_THRESHOLD && p.observations >= RECOMMENDATION_MIN_OBSERVATIONS)
        .map(|p| {
            format!(
                "consider a canary rollout: {} has recurred {} times with {:.0}% confidence",
                p.error,
                p.observations,
                p.confidence * 100.0
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nopea_graph::NodeKind;

    #[test]
    fn failure_patterns_sorted_by_confidence_desc() {
        let mut graph = Graph::new();
        let service = graph.upsert_node(NodeKind::Concept, "api-gw", 0.9, "m0");
        let low = graph.upsert_node(NodeKind::Error, "low", 0.8, "m1");
        let high = graph.upsert_node(NodeKind::Error, "high", 0.8, "m1");
        graph.upsert_relationship(&service.id, Relation::Breaks, &low.id, 0.2, "m1", "ev").unwrap();
        graph.upsert_relationship(&service.id, Relation::Breaks, &high.id, 0.9, "m1", "ev").unwrap();

        let patterns = failure_patterns(&graph, &service.id);
        assert_eq!(patterns[0].error, "high");
        assert_eq!(patterns[1].error, "low");
    }

    #[test]
    fn dependencies_only_include_depends_on_edges() {
        let mut graph = Graph::new();
        let service = graph.upsert_node(NodeKind::Concept, "api-gw", 0.9, "m0");
        let dep = graph.upsert_node(NodeKind::Concept, "auth-svc", 0.8, "m1");
        graph.upsert_relationship(&service.id, Relation::DependsOn, &dep.id, 0.8, "m1", "ev").unwrap();
        let namespace = graph.upsert_node(NodeKind::Concept, "namespace:prod", 0.5, "m1");
        graph
            .upsert_relationship(&service.id, Relation::DeployedTo, &namespace.id, 0.9, "m1", "ev")
            .unwrap();

        let deps = dependencies(&graph, &service.id);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].target_name, "auth-svc");
    }

    #[test]
    fn single_observation_does_not_yet_recommend_canary() {
        let mut graph = Graph::new();
        let service = graph.upsert_node(NodeKind::Concept, "api-gw", 0.9, "m0");
        let error = graph.upsert_node(NodeKind::Error, "crashloopbackoff", 0.8, "m1");
        graph.upsert_relationship(&service.id, Relation::Breaks, &error.id, 0.95, "m1", "ev").unwrap();

        assert!(recommendations(&graph, &service.id).is_empty());
    }

    #[test]
    fn recommendations_fire_after_repeated_high_confidence_failures() {
        let mut graph = Graph::new();
        let service = graph.upsert_node(NodeKind::Concept, "api-gw", 0.9, "m0");
        let error = graph.upsert_node(NodeKind::Error, "crashloopbackoff", 0.8, "m1");
        graph.upsert_relationship(&service.id, Relation::Breaks, &error.id, 0.95, "m1", "ev").unwrap();
        graph.upsert_relationship(&service.id, Relation::Breaks, &error.id, 0.95, "m2", "ev").unwrap();

        let recs = recommendations(&graph, &service.id);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("crashloopbackoff"));
    }
}
