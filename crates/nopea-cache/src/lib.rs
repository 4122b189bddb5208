//! In-memory keyed cache tables (spec.md §4.11).
//!
//! Four `dashmap::DashMap` tables behind one [`Cache`] handle. Each key
//! has a single writer by convention (spec.md §3 "Ownership and
//! lifecycle"); the cache itself enforces nothing beyond concurrent,
//! unconditional reads/writes — callers are responsible for only
//! writing the keys they own.

use dashmap::DashMap;
use nopea_core::{DeployResult, Manifest, ServiceName};
use serde::{Deserialize, Serialize};

/// Status of a service's per-service agent, mirrored into the cache so
/// a freshly (re)started agent can recover continuity (spec.md §4.10
/// "On init the agent recovers `last_result`...").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Deploying,
}

/// Snapshot of a service agent's state, as written to the
/// `service_state` table (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    pub service: ServiceName,
    pub status: AgentStatus,
    pub deploy_count: u64,
    pub last_result: Option<DeployResult>,
}

/// `resource_key = "{kind}/{namespace}/{name}"`, re-exported so
/// callers don't need to depend on `nopea-core` directly just to build
/// a `last_applied` key.
pub use nopea_core::resource_key;

/// The four process-wide cache tables (spec.md §3, §4.11).
#[derive(Debug, Default)]
pub struct Cache {
    deployments: DashMap<(ServiceName, String), DeployResult>,
    service_state: DashMap<ServiceName, ServiceState>,
    graph_snapshot: DashMap<(), Vec<u8>>,
    last_applied: DashMap<(ServiceName, String), Manifest>,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff all four tables exist — always true once a `Cache`
    /// is constructed, since there's no partial-construction state
    /// representable in this type (spec.md §4.11).
    #[must_use]
    pub fn available(&self) -> bool {
        true
    }

    pub fn put_deployment(&self, service: &str, deploy_id: &str, result: DeployResult) {
        self.deployments
            .insert((service.to_string(), deploy_id.to_string()), result);
    }

    #[must_use]
    pub fn get_deployment(&self, service: &str, deploy_id: &str) -> Option<DeployResult> {
        self.deployments
            .get(&(service.to_string(), deploy_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Scans the deployments table by service prefix (spec.md §4.11).
    #[must_use]
    pub fn list_deployments(&self, service: &str) -> Vec<DeployResult> {
        let mut results: Vec<DeployResult> = self
            .deployments
            .iter()
            .filter(|entry| entry.key().0 == service)
            .map(|entry| entry.value().clone())
            .collect();
        results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        results
    }

    pub fn put_service_state(&self, state: ServiceState) {
        self.service_state.insert(state.service.clone(), state);
    }

    #[must_use]
    pub fn get_service_state(&self, service: &str) -> Option<ServiceState> {
        self.service_state.get(service).map(|entry| entry.value().clone())
    }

    /// Enumerates keys of `service_state` (spec.md §4.11).
    #[must_use]
    pub fn list_services(&self) -> Vec<ServiceName> {
        self.service_state.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn put_graph_snapshot(&self, bytes: Vec<u8>) {
        self.graph_snapshot.insert((), bytes);
    }

    #[must_use]
    pub fn get_graph_snapshot(&self) -> Option<Vec<u8>> {
        self.graph_snapshot.get(&()).map(|entry| entry.value().clone())
    }

    pub fn put_last_applied(&self, service: &str, resource_key: &str, manifest: Manifest) {
        self.last_applied
            .insert((service.to_string(), resource_key.to_string()), manifest);
    }

    #[must_use]
    pub fn get_last_applied(&self, service: &str, resource_key: &str) -> Option<Manifest> {
        self.last_applied
            .get(&(service.to_string(), resource_key.to_string()))
            .map(|entry| entry.value().clone())
    }
}
