//! The single-owner memory service (spec.md §4.3): one task owns the
//! [`Graph`], reached through a bounded channel so every mutation is
//! processed in submission order with no shared mutable state.

use crate::ingestor::{ingest, DeployOutcome};
use crate::query;
use crate::snapshot;
use nopea_cache::Cache;
use nopea_core::{DeployContext, Namespace, ServiceName};
use nopea_graph::{Graph, NodeKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const INGEST_CHANNEL_CAPACITY: usize = 1024;
const DECAY_TICK_INTERVAL: Duration = Duration::from_secs(3600);
const DECAY_FACTOR: f64 = 0.98;

enum MemoryMsg {
    RecordDeploy(DeployOutcome),
    GetContext {
        service: ServiceName,
        namespace: Namespace,
        reply: oneshot::Sender<DeployContext>,
    },
    Counts(oneshot::Sender<(usize, usize)>),
    CloneGraph(oneshot::Sender<Graph>),
}

/// A cheaply-cloneable handle to the running memory service.
#[derive(Clone)]
pub struct MemoryHandle {
    sender: mpsc::Sender<MemoryMsg>,
}

impl MemoryHandle {
    /// Non-blocking submission (spec.md §4.3). If the channel is
    /// saturated the deploy is dropped and a warning logged, the same
    /// backpressure policy `nopea-telemetry`'s CDEvents sink uses for
    /// fire-and-forget paths.
    pub fn record_deploy(&self, outcome: DeployOutcome) {
        if let Err(err) = self.sender.try_send(MemoryMsg::RecordDeploy(outcome)) {
            tracing::warn!(%err, "memory ingest channel saturated, dropping deploy outcome");
        }
    }

    pub async fn get_deploy_context(&self, service: &ServiceName, namespace: &Namespace) -> DeployContext {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(MemoryMsg::GetContext {
                service: service.clone(),
                namespace: namespace.clone(),
                reply,
            })
            .await
            .is_err()
        {
            return DeployContext::empty(service, namespace);
        }
        rx.await.unwrap_or_else(|_| DeployContext::empty(service, namespace))
    }

    pub async fn node_count(&self) -> usize {
        self.counts().await.0
    }

    pub async fn relationship_count(&self) -> usize {
        self.counts().await.1
    }

    async fn counts(&self) -> (usize, usize) {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(MemoryMsg::Counts(reply)).await.is_err() {
            return (0, 0);
        }
        rx.await.unwrap_or((0, 0))
    }

    /// Introspection: a point-in-time clone of the live graph.
    pub async fn get_graph(&self) -> Graph {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(MemoryMsg::CloneGraph(reply)).await.is_err() {
            return Graph::new();
        }
        rx.await.unwrap_or_default()
    }
}

/// Starts the memory service task. Restores the graph from the
/// cache's snapshot slot if present and well-formed; otherwise starts
/// empty and logs a warning (spec.md §4.3 "Lifecycle").
#[must_use]
pub fn spawn(cache: Arc<Cache>) -> MemoryHandle {
    let (sender, receiver) = mpsc::channel(INGEST_CHANNEL_CAPACITY);
    tokio::spawn(run(cache, receiver));
    MemoryHandle { sender }
}

fn restore_graph(cache: &Cache) -> Graph {
    match cache.get_graph_snapshot() {
        Some(bytes) => snapshot::decode(&bytes).unwrap_or_else(|| {
            tracing::warn!("graph snapshot failed integrity validation, starting empty");
            Graph::new()
        }),
        None => Graph::new(),
    }
}

async fn run(cache: Arc<Cache>, mut receiver: mpsc::Receiver<MemoryMsg>) {
    let mut graph = restore_graph(&cache);
    let mut decay_tick = tokio::time::interval(DECAY_TICK_INTERVAL);
    decay_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    decay_tick.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            msg = receiver.recv() => {
                let Some(msg) = msg else { break };
                handle(&mut graph, &cache, msg);
            }
            _ = decay_tick.tick() => {
                graph.decay_all(DECAY_FACTOR);
                cache.put_graph_snapshot(snapshot::encode(&graph));
            }
        }
    }
}

fn handle(graph: &mut Graph, cache: &Cache, msg: MemoryMsg) {
    match msg {
        MemoryMsg::RecordDeploy(outcome) => {
            match ingest(graph, &outcome) {
                Ok(()) => cache.put_graph_snapshot(snapshot::encode(graph)),
                Err(err) => tracing::warn!(%err, "memory ingestor rejected deploy outcome, graph unchanged"),
            }
        }
        MemoryMsg::GetContext { service, namespace, reply } => {
            let context = build_context(graph, &service, &namespace);
            let _ = reply.send(context);
        }
        MemoryMsg::Counts(reply) => {
            let _ = reply.send((graph.node_count(), graph.relationship_count()));
        }
        MemoryMsg::CloneGraph(reply) => {
            let _ = reply.send(graph.clone());
        }
    }
}

fn build_context(graph: &Graph, service: &ServiceName, namespace: &Namespace) -> DeployContext {
    let id = nopea_graph::node_id(NodeKind::Concept, service);
    let Some(_) = graph.get_node(&id) else {
        return DeployContext::empty(service, namespace);
    };
    let failure_patterns = query::failure_patterns(graph, &id);
    let dependencies = query::dependencies(graph, &id);
    let recommendations = query::recommendations(graph, &id);
    DeployContext {
        service: service.clone(),
        namespace: namespace.clone(),
        known: true,
        failure_patterns,
        dependencies,
        recommendations,
    }
}
