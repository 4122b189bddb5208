//! Binary graph snapshot, wrapped with the shared integrity envelope
//! (spec.md §4.3 "attempts to restore the graph from the cache's
//! snapshot slot using a length-bounded, schema-validated
//! deserialization").

use nopea_core::envelope;
use nopea_graph::{Graph, Node, Relationship};
use serde::{Deserialize, Serialize};

const SNAPSHOT_MAGIC: &[u8; 4] = b"NOPG";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotPayload {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
}

#[must_use]
pub fn encode(graph: &Graph) -> Vec<u8> {
    let payload = SnapshotPayload {
        nodes: graph.nodes().cloned().collect(),
        relationships: graph.relationships().cloned().collect(),
    };
    envelope::wrap(SNAPSHOT_MAGIC, &payload).expect("bincode-encoding a graph snapshot cannot fail")
}

/// Returns `None` on any integrity failure — callers fall back to an
/// empty graph and log a warning (spec.md §4.3).
#[must_use]
pub fn decode(bytes: &[u8]) -> Option<Graph> {
    let payload: SnapshotPayload = envelope::unwrap(SNAPSHOT_MAGIC, bytes).ok()?;
    Some(Graph::from_parts(payload.nodes, payload.relationships))
}
