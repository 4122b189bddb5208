//! One long-lived worker per live service (spec.md §4.10). Deploys
//! for a service are strictly serialized; a crashed deploy worker is
//! isolated from every other agent and from the orchestrator's own
//! state.

use nopea_cache::{AgentStatus, Cache, ServiceState};
use nopea_core::{DeployError, DeployResult, DeploySpec, DeployStatus, ServiceName};
use nopea_orchestrator::Orchestrator;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Waiters queue up to this many deep before a deploy request is
/// rejected with `queue_full` (spec.md §4.10).
pub const MAX_QUEUE_LEN: usize = 10;

/// Cooldown before dequeuing the next waiter after a worker crash —
/// protects a broken service from an immediate retry storm
/// (spec.md §4.10).
const CRASH_COOLDOWN: Duration = Duration::from_secs(2);

enum AgentMsg {
    Deploy { spec: DeploySpec, reply: oneshot::Sender<DeployResult> },
    Status { reply: oneshot::Sender<AgentStatusReport> },
}

/// Snapshot returned by `status`/`health` (spec.md §4.10).
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusReport {
    pub service: ServiceName,
    pub status: AgentStatus,
    pub deploy_count: u64,
    pub queue_length: usize,
    pub last_result: Option<DeployResult>,
}

/// A cheaply-cloneable handle to a running agent task.
#[derive(Clone)]
pub struct AgentHandle {
    sender: mpsc::Sender<AgentMsg>,
}

impl AgentHandle {
    /// Blocks until the deploy completes, routed through the agent's
    /// serialization point (spec.md §4.10, §5).
    pub async fn deploy(&self, spec: DeploySpec) -> DeployResult {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(AgentMsg::Deploy { spec: spec.clone(), reply }).await.is_err() {
            return crashed_agent_result(&spec, "agent task is no longer running".to_string());
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => crashed_agent_result(&spec, "agent dropped the reply channel".to_string()),
        }
    }

    pub async fn status(&self) -> Option<AgentStatusReport> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(AgentMsg::Status { reply }).await.ok()?;
        rx.await.ok()
    }

    /// True once the agent task has exited (idle timeout) and its
    /// mailbox is gone. A registry holding a closed handle must
    /// re-spawn rather than hand it out again.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

fn crashed_agent_result(spec: &DeploySpec, reason: String) -> DeployResult {
    DeployResult {
        deploy_id: nopea_ids::next_id().to_string(),
        service: spec.service.clone(),
        namespace: spec.namespace.clone(),
        status: DeployStatus::Failed,
        strategy: spec.strategy.unwrap_or(nopea_core::Strategy::Direct),
        manifest_count: spec.manifests.len(),
        duration_ms: 0,
        verified: false,
        error: Some(DeployError::WorkerCrash { reason }),
        applied_resources: Vec::new(),
        timestamp: chrono::Utc::now(),
    }
}

struct CurrentDeploy {
    handle: JoinHandle<DeployResult>,
    waiter: oneshot::Sender<DeployResult>,
    spec: DeploySpec,
    start: Instant,
}

/// Spawns the agent task and returns a handle to it. Recovers
/// `last_result` from the cache's `service_state` entry if one is
/// present, so a freshly restarted agent shows continuity
/// (spec.md §4.10 "On init...").
#[must_use]
pub fn spawn(service: ServiceName, orchestrator: Arc<Orchestrator>, cache: Arc<Cache>, idle_timeout: Duration) -> AgentHandle {
    let (sender, receiver) = mpsc::channel(64);
    tokio::spawn(run(service, orchestrator, cache, receiver, idle_timeout));
    AgentHandle { sender }
}

async fn run(
    service: ServiceName,
    orchestrator: Arc<Orchestrator>,
    cache: Arc<Cache>,
    mut receiver: mpsc::Receiver<AgentMsg>,
    idle_timeout: Duration,
) {
    let mut deploy_count = 0u64;
    let mut last_result = cache.get_service_state(&service).and_then(|s| s.last_result);
    let mut queue: VecDeque<(DeploySpec, oneshot::Sender<DeployResult>)> = VecDeque::new();
    let mut current: Option<CurrentDeploy> = None;
    let mut cooldown_until: Option<Instant> = None;

    loop {
        let status = if current.is_some() { AgentStatus::Deploying } else { AgentStatus::Idle };
        persist_service_state(&cache, &service, status, deploy_count, &last_result);

        tokio::select! {
            msg = receiver.recv() => {
                match msg {
                    None => break,
                    Some(AgentMsg::Deploy { spec, reply }) => {
                        if current.is_none() && cooldown_until.is_none() {
                            current = Some(start_worker(orchestrator.clone(), spec, reply));
                        } else if queue.len() < MAX_QUEUE_LEN {
                            queue.push_back((spec, reply));
                        } else {
                            let _ = reply.send(crashed_agent_result_queue_full(&spec));
                        }
                    }
                    Some(AgentMsg::Status { reply }) => {
                        let _ = reply.send(AgentStatusReport {
                            service: service.clone(),
                            status,
                            deploy_count,
                            queue_length: queue.len(),
                            last_result: last_result.clone(),
                        });
                    }
                }
            }
            result = wait_current(&mut current), if current.is_some() => {
                let finished = current.take().unwrap();
                let outcome = match result {
                    Ok(deploy_result) => deploy_result,
                    Err(join_err) => {
                        cooldown_until = Some(Instant::now() + CRASH_COOLDOWN);
                        let duration_ms = finished.start.elapsed().as_millis() as u64;
                        synthesize_crash_result(&finished.spec, join_err.to_string(), duration_ms)
                    }
                };
                deploy_count += 1;
                last_result = Some(outcome.clone());
                let _ = finished.waiter.send(outcome);
            }
            () = wait_cooldown(cooldown_until), if cooldown_until.is_some() => {
                cooldown_until = None;
            }
            () = tokio::time::sleep(idle_timeout), if current.is_none() && queue.is_empty() && cooldown_until.is_none() => {
                tracing::debug!(%service, "agent idle-timed-out, stopping");
                break;
            }
        }

        if current.is_none() && cooldown_until.is_none() {
            if let Some((spec, waiter)) = queue.pop_front() {
                current = Some(start_worker(orchestrator.clone(), spec, waiter));
            }
        }
    }
}

async fn wait_current(current: &mut Option<CurrentDeploy>) -> Result<DeployResult, tokio::task::JoinError> {
    (&mut current.as_mut().expect("guarded by current.is_some()").handle).await
}

async fn wait_cooldown(cooldown_until: Option<Instant>) {
    if let Some(until) = cooldown_until {
        tokio::time::sleep_until(until).await;
    }
}

fn start_worker(orchestrator: Arc<Orchestrator>, spec: DeploySpec, waiter: oneshot::Sender<DeployResult>) -> CurrentDeploy {
    let start = Instant::now();
    let task_spec = spec.clone();
    let handle = tokio::spawn(async move { orchestrator.run(task_spec).await });
    CurrentDeploy { handle, waiter, spec, start }
}

fn synthesize_crash_result(spec: &DeploySpec, reason: String, duration_ms: u64) -> DeployResult {
    DeployResult {
        deploy_id: nopea_ids::next_id().to_string(),
        service: spec.service.clone(),
        namespace: spec.namespace.clone(),
        status: DeployStatus::Failed,
        strategy: spec.strategy.unwrap_or(nopea_core::Strategy::Direct),
        manifest_count: spec.manifests.len(),
        duration_ms,
        verified: false,
        error: Some(DeployError::WorkerCrash { reason }),
        applied_resources: Vec::new(),
        timestamp: chrono::Utc::now(),
    }
}

fn crashed_agent_result_queue_full(spec: &DeploySpec) -> DeployResult {
    DeployResult {
        deploy_id: nopea_ids::next_id().to_string(),
        service: spec.service.clone(),
        namespace: spec.namespace.clone(),
        status: DeployStatus::Failed,
        strategy: spec.strategy.unwrap_or(nopea_core::Strategy::Direct),
        manifest_count: spec.manifests.len(),
        duration_ms: 0,
        verified: false,
        error: Some(DeployError::QueueFull),
        applied_resources: Vec::new(),
        timestamp: chrono::Utc::now(),
    }
}

fn persist_service_state(cache: &Cache, service: &ServiceName, status: AgentStatus, deploy_count: u64, last_result: &Option<DeployResult>) {
    cache.put_service_state(ServiceState {
        service: service.clone(),
        status,
        deploy_count,
        last_result: last_result.clone(),
    });
}
