//! One module per CLI subcommand (spec.md §6), each exposing an
//! `Args` struct and an async `run()`.

pub mod context;
pub mod deploy;
pub mod history;
pub mod memory;
pub mod serve;
pub mod status;

use nopea_agent::AgentRegistry;
use nopea_cache::Cache;
use nopea_k8s::{K8sClient, NullK8sClient};
use nopea_memory::MemoryHandle;
use nopea_orchestrator::Orchestrator;
use nopea_telemetry::CdEventsEmitter;
use std::sync::Arc;

/// Everything every subcommand needs, built fresh per invocation. The
/// in-memory [`Cache`] and graph don't outlive the process in this
/// one-shot CLI form — only `serve` keeps them alive across requests.
pub struct Environment {
    pub agents: Arc<AgentRegistry>,
    pub memory: MemoryHandle,
    pub cache: Arc<Cache>,
}

/// Builds a fresh environment wired to a [`NullK8sClient`] unless
/// `k8s_module`/`k8s_conn` configuration selects otherwise
/// (spec.md §6 "Environment / configuration options"). No alternate
/// K8s collaborator ships in this crate, so the null client is the
/// only implementation available to select today regardless of
/// `config.k8s_module`.
#[must_use]
pub fn build_environment(config: &nopea_core::Config) -> Environment {
    let k8s: Arc<dyn K8sClient> = Arc::new(NullK8sClient::new());
    let cache = Arc::new(Cache::new());
    let memory = nopea_memory::spawn(cache.clone());
    let orchestrator = Orchestrator::new(
        k8s,
        cache.clone(),
        Some(memory.clone()),
        CdEventsEmitter::new(config.cdevents_endpoint.clone()),
    );
    let agents = Arc::new(AgentRegistry::new(Arc::new(orchestrator), cache.clone()));
    Environment { agents, memory, cache }
}

pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("error: failed to render JSON: {err}"),
    }
}
