//! Per-service agents (spec.md §4.10): every live service gets its own
//! long-running task that serializes deploys for that service,
//! isolates a crashed worker from every other service, and bounds the
//! waiter queue. [`AgentRegistry`] is the process-wide entry point;
//! agents are started lazily and expire after an idle timeout.

mod agent;

pub use agent::{AgentHandle, AgentStatusReport, MAX_QUEUE_LEN};

use dashmap::DashMap;
use nopea_cache::Cache;
use nopea_core::{DeployResult, DeploySpec, ServiceName};
use nopea_orchestrator::Orchestrator;
use std::sync::Arc;
use std::time::Duration;

/// No deploy or status request for this long and the agent task exits
/// (spec.md §4.10).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Process-wide registry of running per-service agents
/// (spec.md §4.10 "`ensure_started(service) -> agent_handle`.
/// Idempotent.").
pub struct AgentRegistry {
    orchestrator: Arc<Orchestrator>,
    cache: Arc<Cache>,
    agents: DashMap<ServiceName, AgentHandle>,
    idle_timeout: Duration,
}

impl AgentRegistry {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, cache: Arc<Cache>) -> Self {
        Self::with_idle_timeout(orchestrator, cache, DEFAULT_IDLE_TIMEOUT)
    }

    #[must_use]
    pub fn with_idle_timeout(orchestrator: Arc<Orchestrator>, cache: Arc<Cache>, idle_timeout: Duration) -> Self {
        Self {
            orchestrator,
            cache,
            agents: DashMap::new(),
            idle_timeout,
        }
    }

    /// Returns the running agent for `service`, spawning one if it
    /// isn't already running or has idle-timed-out since last use.
    /// Idempotent: concurrent callers for the same service never spawn
    /// more than one agent, since `DashMap::entry` holds the shard
    /// lock across the check-and-insert. `or_insert_with` only covers
    /// the "never started" case — an entry can also be present but
    /// dead (its task idle-timed-out and dropped the receiver), so a
    /// closed handle is replaced in place rather than handed out.
    pub fn ensure_started(&self, service: &ServiceName) -> AgentHandle {
        let mut entry = self.agents.entry(service.clone()).or_insert_with(|| {
            agent::spawn(service.clone(), self.orchestrator.clone(), self.cache.clone(), self.idle_timeout)
        });
        if entry.value().is_closed() {
            *entry.value_mut() = agent::spawn(service.clone(), self.orchestrator.clone(), self.cache.clone(), self.idle_timeout);
        }
        entry.value().clone()
    }

    /// Routes a deploy through the service's agent, blocking until it
    /// completes (spec.md §4.10 "`deploy(service, spec) -> result`
    /// (blocking)").
    pub async fn deploy(&self, service: &ServiceName, spec: DeploySpec) -> DeployResult {
        let handle = self.ensure_started(service);
        handle.deploy(spec).await
    }

    /// `None` if the service has no running agent — it either never
    /// started or idle-timed-out (spec.md §4.10 "or `not_found`").
    pub async fn status(&self, service: &ServiceName) -> Option<AgentStatusReport> {
        let handle = self.agents.get(service)?.value().clone();
        handle.status().await
    }

    /// Polls every registered agent; an agent that idle-timed-out
    /// between registration and this call simply returns `None` from
    /// its handle and is skipped (spec.md §4.10 "`health() ->
    /// [{service, status, deploy_count, last_result?}, ...]`").
    pub async fn health(&self) -> Vec<AgentStatusReport> {
        let handles: Vec<AgentHandle> = self.agents.iter().map(|entry| entry.value().clone()).collect();
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(report) = handle.status().await {
                reports.push(report);
            }
        }
        reports
    }
}
