//! The deploy lifecycle (spec.md §4.6): assign an id, fetch context,
//! select a strategy, execute it, verify the result, then record and
//! report the outcome. Never raises — every path returns a
//! [`DeployResult`].

use nopea_cache::Cache;
use nopea_core::{
    resource_key, DeployContext, DeployError, DeployResult, DeploySpec, DeployStatus, Manifest,
    Strategy,
};
use nopea_drift::{is_verified, verify_manifest};
use nopea_k8s::K8sClient;
use nopea_memory::{DeployOutcome, MemoryHandle};
use nopea_telemetry::{metrics, CdEventsEmitter, DeploymentEventKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Strategy auto-selection crosses into canary once any failure
/// pattern's confidence exceeds this (spec.md §4.6 step 3).
const AUTO_CANARY_CONFIDENCE_THRESHOLD: f64 = 0.15;

pub struct Orchestrator {
    pub k8s: Arc<dyn K8sClient>,
    pub cache: Arc<Cache>,
    pub memory: Option<MemoryHandle>,
    pub cdevents: CdEventsEmitter,
    pub occurrence_root: PathBuf,
}

impl Orchestrator {
    #[must_use]
    pub fn new(k8s: Arc<dyn K8sClient>, cache: Arc<Cache>, memory: Option<MemoryHandle>, cdevents: CdEventsEmitter) -> Self {
        Self {
            k8s,
            cache,
            memory,
            cdevents,
            occurrence_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub async fn run(&self, spec: DeploySpec) -> DeployResult {
        let deploy_id = nopea_ids::next_id().to_string();
        let start = tokio::time::Instant::now();

        let context = self.fetch_context(&spec).await;
        let strategy = select_strategy(&spec, context.as_ref());

        metrics::record_deploy_start(&spec.service);
        if self.cdevents.enabled() {
            self.cdevents.emit_deployment_event(DeploymentEventKind::Started, &spec.service);
        }

        let (applied, error) = self.execute(&spec, strategy).await;
        let verified = if error.is_none() {
            self.verify_all(&spec, &applied).await
        } else {
            false
        };

        let status = if error.is_some() { DeployStatus::Failed } else { DeployStatus::Completed };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = DeployResult {
            deploy_id,
            service: spec.service.clone(),
            namespace: spec.namespace.clone(),
            status,
            strategy,
            manifest_count: spec.manifests.len(),
            duration_ms,
            verified,
            error,
            applied_resources: applied,
            timestamp: chrono::Utc::now(),
        };

        self.record(&spec, &result, context.as_ref());

        metrics::record_deploy_stop(&spec.service, &result.status.to_string(), &strategy.to_string(), duration_ms);
        if self.cdevents.enabled() {
            self.cdevents
                .emit_deployment_event(DeploymentEventKind::for_status(result.status), &spec.service);
        }

        result
    }

    async fn fetch_context(&self, spec: &DeploySpec) -> Option<DeployContext> {
        match &self.memory {
            Some(memory) => Some(memory.get_deploy_context(&spec.service, &spec.namespace).await),
            None => None,
        }
    }

    async fn execute(&self, spec: &DeploySpec, strategy: Strategy) -> (Vec<Manifest>, Option<DeployError>) {
        if let Err(reason) = spec.options.validate() {
            return (Vec::new(), Some(DeployError::Other(reason)));
        }

        let timeout = Duration::from_millis(spec.timeout_ms);
        let execution = nopea_strategy::execute(
            self.k8s.as_ref(),
            strategy,
            &spec.service,
            &spec.namespace,
            &spec.manifests,
            &spec.options,
        );

        match tokio::time::timeout(timeout, execution).await {
            Ok(Ok(applied)) => (applied, None),
            Ok(Err(err)) => (Vec::new(), Some(err)),
            Err(_) => (Vec::new(), Some(DeployError::Timeout)),
        }
    }

    /// `verified` is true iff every applied manifest verifies as
    /// `no_drift` or `new_resource`; any verification exception only
    /// clears the flag, it never fails the deploy (spec.md §4.6 step 6).
    ///
    /// `last_applied` is recorded *before* diffing, not after: the
    /// apply this manifest just went through already made it live, so
    /// the baseline this deploy is diffed against has to be itself,
    /// not whatever (or nothing) preceded it. Recording afterward would
    /// make every first deploy of a resource diff against a `None`
    /// baseline against an already-live resource and come back
    /// `needs_apply` even though nothing actually drifted.
    async fn verify_all(&self, spec: &DeploySpec, applied: &[Manifest]) -> bool {
        let mut all_verified = true;
        for manifest in applied {
            self.cache.put_last_applied(&spec.service, &resource_key(manifest), manifest.clone());
            let outcome = verify_manifest(&self.cache, self.k8s.as_ref(), &spec.service, manifest).await;
            match outcome {
                Ok(outcome) => {
                    if !is_verified(&outcome) {
                        all_verified = false;
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, service = %spec.service, "post-deploy verification failed");
                    all_verified = false;
                }
            }
        }
        all_verified
    }

    fn record(&self, spec: &DeploySpec, result: &DeployResult, context: Option<&DeployContext>) {
        self.cache.put_deployment(&spec.service, &result.deploy_id, result.clone());

        if let Some(memory) = &self.memory {
            memory.record_deploy(DeployOutcome {
                service: result.service.clone(),
                namespace: result.namespace.clone(),
                status: result.status,
                error: result.error.as_ref().map(|e| e.code().to_string()),
                concurrent_deploys: Vec::new(),
            });
        }

        let occurrence = nopea_occurrence::build(&result.deploy_id, result, &result.applied_resources, context);
        if let Err(err) = nopea_occurrence::persist(&self.occurrence_root, &occurrence) {
            tracing::error!(%err, deploy_id = %result.deploy_id, "failed to persist occurrence artifact");
        }
    }
}

/// Strategy selection rule (spec.md §4.6 step 3).
fn select_strategy(spec: &DeploySpec, context: Option<&DeployContext>) -> Strategy {
    if let Some(strategy) = spec.strategy {
        return strategy;
    }
    match context {
        Some(ctx) if ctx.failure_patterns.iter().any(|p| p.confidence > AUTO_CANARY_CONFIDENCE_THRESHOLD) => {
            Strategy::Canary
        }
        _ => Strategy::Direct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nopea_core::{DeployOptions, FailurePattern};
    use nopea_k8s::NullK8sClient;
    use serde_json::json;

    fn orchestrator() -> Orchestrator {
        let tmp = tempfile::tempdir().unwrap();
        let mut o = Orchestrator::new(
            Arc::new(NullK8sClient::new()),
            Arc::new(Cache::new()),
            None,
            CdEventsEmitter::new(None),
        );
        o.occurrence_root = tmp.keep();
        o
    }

    fn spec(service: &str) -> DeploySpec {
        DeploySpec {
            service: service.to_string(),
            namespace: "default".to_string(),
            manifests: vec![json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": service}})],
            strategy: None,
            options: DeployOptions::default(),
            timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn fresh_service_direct_deploy_completes_and_verifies() {
        let orchestrator = orchestrator();
        let result = orchestrator.run(spec("api-gw")).await;
        assert_eq!(result.status, DeployStatus::Completed);
        assert_eq!(result.strategy, Strategy::Direct);
        assert!(result.verified);
    }

    #[test]
    fn explicit_strategy_always_wins() {
        let mut s = spec("api-gw");
        s.strategy = Some(Strategy::BlueGreen);
        assert_eq!(select_strategy(&s, None), Strategy::BlueGreen);
    }

    #[test]
    fn high_confidence_failure_pattern_auto_selects_canary() {
        let s = spec("api-gw");
        let context = DeployContext {
            service: "api-gw".to_string(),
            namespace: "default".to_string(),
            known: true,
            failure_patterns: vec![FailurePattern {
                error: "crashloopbackoff".to_string(),
                confidence: 0.2,
                observations: 3,
                evidence: vec![],
            }],
            dependencies: vec![],
            recommendations: vec![],
        };
        assert_eq!(select_strategy(&s, Some(&context)), Strategy::Canary);
    }

    #[test]
    fn low_confidence_failure_pattern_stays_direct() {
        let s = spec("api-gw");
        let context = DeployContext {
            service: "api-gw".to_string(),
            namespace: "default".to_string(),
            known: true,
            failure_patterns: vec![FailurePattern {
                error: "crashloopbackoff".to_string(),
                confidence: 0.1,
                observations: 1,
                evidence: vec![],
            }],
            dependencies: vec![],
            recommendations: vec![],
        };
        assert_eq!(select_strategy(&s, Some(&context)), Strategy::Direct);
    }

    #[tokio::test]
    async fn missing_deployment_manifest_fails_rollout_strategies() {
        let orchestrator = orchestrator();
        let mut s = spec("api-gw");
        s.strategy = Some(Strategy::Canary);
        s.manifests = vec![json!({"kind": "Service"})];
        let result = orchestrator.run(s).await;
        assert_eq!(result.status, DeployStatus::Failed);
        assert!(matches!(result.error, Some(DeployError::NoDeploymentFound)));
    }
}
