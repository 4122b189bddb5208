//! Maps a finished deploy into graph operations (spec.md §4.4).

use chrono::Utc;
use nopea_core::DeployStatus;
use nopea_graph::{Graph, NodeKind, Relation};
use thiserror::Error;

/// The minimal shape the ingestor needs out of a deploy outcome —
/// deliberately narrower than [`nopea_core::DeployResult`] so tests
/// and the orchestrator can both construct it without depending on
/// fields the ingestor doesn't read.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub service: String,
    pub namespace: String,
    pub status: DeployStatus,
    pub error: Option<String>,
    pub concurrent_deploys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("deploy outcome is missing a service name")]
    MissingService,
}

fn status_confidence(status: DeployStatus) -> f64 {
    match status {
        DeployStatus::Completed => 0.9,
        DeployStatus::Failed => 0.8,
        DeployStatus::RolledBack => 0.7,
    }
}

/// Applies the mapping rules in spec.md §4.4. On error the graph is
/// left untouched — validation happens before any upsert.
pub fn ingest(graph: &mut Graph, outcome: &DeployOutcome) -> Result<(), IngestError> {
    if outcome.service.is_empty() {
        return Err(IngestError::MissingService);
    }

    let marker = nopea_ids::next_id().to_string();
    let confidence = status_confidence(outcome.status);

    let service_node = graph.upsert_node(NodeKind::Concept, &outcome.service, confidence, &marker);
    let namespace_name = format!("namespace:{}", outcome.namespace);
    let namespace_node = graph.upsert_node(NodeKind::Concept, &namespace_name, 0.5, &marker);

    let deployed_to_evidence = format!("deploy {} at {}", outcome.status, Utc::now().to_rfc3339());
    graph
        .upsert_relationship(
            &service_node.id,
            Relation::DeployedTo,
            &namespace_node.id,
            confidence,
            &marker,
            deployed_to_evidence,
        )
        .expect("both endpoints were just upserted");

    if outcome.status == DeployStatus::Failed {
        if let Some(error) = &outcome.error {
            let tag = error.to_lowercase();
            let error_node = graph.upsert_node(NodeKind::Error, &tag, 0.8, &marker);
            graph
                .upsert_relationship(
                    &service_node.id,
                    Relation::Breaks,
                    &error_node.id,
                    0.8,
                    &marker,
                    format!("deploy failed: {error}"),
                )
                .expect("both endpoints were just upserted");
        }
    }

    for name in &outcome.concurrent_deploys {
        graph.upsert_node(NodeKind::Concept, name, 0.5, &marker);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: DeployStatus, error: Option<&str>) -> DeployOutcome {
        DeployOutcome {
            service: "api-gw".to_string(),
            namespace: "production".to_string(),
            status,
            error: error.map(str::to_string),
            concurrent_deploys: vec![],
        }
    }

    #[test]
    fn completed_deploy_links_service_to_namespace() {
        let mut graph = Graph::new();
        ingest(&mut graph, &outcome(DeployStatus::Completed, None)).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn failed_deploy_with_error_adds_breaks_edge() {
        let mut graph = Graph::new();
        ingest(&mut graph, &outcome(DeployStatus::Failed, Some("CrashLoopBackOff"))).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.relationship_count(), 2);
    }

    #[test]
    fn error_tag_is_canonicalized_lowercase() {
        let mut graph = Graph::new();
        ingest(&mut graph, &outcome(DeployStatus::Failed, Some("CrashLoopBackOff"))).unwrap();
        let id = nopea_graph::node_id(NodeKind::Error, "crashloopbackoff");
        assert!(graph.get_node(&id).is_some());
    }

    #[test]
    fn concurrent_deploys_are_upserted_as_concepts() {
        let mut graph = Graph::new();
        let mut o = outcome(DeployStatus::Completed, None);
        o.concurrent_deploys = vec!["worker-a".to_string(), "worker-b".to_string()];
        ingest(&mut graph, &o).unwrap();
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn missing_service_leaves_graph_unchanged() {
        let mut graph = Graph::new();
        let mut o = outcome(DeployStatus::Completed, None);
        o.service = String::new();
        let err = ingest(&mut graph, &o).unwrap_err();
        assert_eq!(err, IngestError::MissingService);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn repeated_ingestion_reinforces_rather_than_duplicates() {
        let mut graph = Graph::new();
        for _ in 0..3 {
            ingest(&mut graph, &outcome(DeployStatus::Completed, None)).unwrap();
        }
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
    }
}
