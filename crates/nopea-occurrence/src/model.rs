//! The structured post-deploy report (spec.md §4.9).

use chrono::{DateTime, Utc};
use nopea_core::{DeployContext, DeployError, DeployResult, DeployStatus, Manifest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceError {
    pub code: String,
    pub what_failed: String,
    pub why_it_matters: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceReasoning {
    pub summary: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_context: Option<DeployContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceStep {
    pub step: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceHistory {
    pub steps: Vec<OccurrenceStep>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceDeployData {
    pub service: String,
    pub namespace: String,
    pub strategy: String,
    pub manifests_applied: usize,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub version: String,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OccurrenceError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<OccurrenceReasoning>,
    pub history: OccurrenceHistory,
    pub deploy_data: OccurrenceDeployData,
}

fn outcome_tag(status: DeployStatus) -> &'static str {
    match status {
        DeployStatus::Completed => "completed",
        DeployStatus::Failed => "failed",
        DeployStatus::RolledBack => "rolledback",
    }
}

fn severity_for(status: DeployStatus) -> &'static str {
    match status {
        DeployStatus::Completed => "info",
        DeployStatus::Failed => "error",
        DeployStatus::RolledBack => "warning",
    }
}

fn impact_for(error: &DeployError) -> &'static str {
    match error {
        DeployError::QueueFull => "the deploy never started and must be retried",
        DeployError::WorkerCrash { .. } => "the deploy state is unknown and must be investigated",
        DeployError::NoDeploymentFound => "no rollout could be built from the supplied manifests",
        DeployError::Forbidden => "the cluster rejected the request",
        DeployError::NotFound => "the target resource does not exist",
        DeployError::Timeout => "the operation did not complete in time",
        DeployError::ConnectionRefused => "the cluster was unreachable",
        DeployError::ApplyFailed { .. } => "the manifests were not applied",
        DeployError::Other(_) => "the outcome could not be classified",
        _ => "the outcome could not be classified",
    }
}

fn reasoning_summary(status: DeployStatus, error: Option<&DeployError>) -> String {
    match (status, error) {
        (DeployStatus::RolledBack, Some(e)) => format!("deploy was rolled back after {}", e.code()),
        (DeployStatus::Failed, Some(e)) => format!("deploy failed due to {}", e.code()),
        (_, Some(e)) => format!("deploy ended with {}", e.code()),
        (_, None) => "deploy did not complete successfully".to_string(),
    }
}

/// Builds the report from a finished deploy plus the memory context
/// that informed strategy selection, if any (spec.md §4.9).
#[must_use]
pub fn build(
    id: &str,
    result: &DeployResult,
    applied_manifests: &[Manifest],
    context: Option<&DeployContext>,
) -> Occurrence {
    let outcome = outcome_tag(result.status);
    let is_completed = result.status == DeployStatus::Completed;

    let error = if is_completed {
        None
    } else {
        result.error.as_ref().map(|e| OccurrenceError {
            code: e.code().to_string(),
            what_failed: format!("deploy of {} ({})", result.service, result.strategy),
            why_it_matters: format!("{} in {} is not updated — {}", result.service, result.namespace, impact_for(e)),
            message: Some(e.to_string()),
        })
    };

    let reasoning = if is_completed {
        None
    } else {
        let known = context.map(|c| c.known).unwrap_or(false);
        Some(OccurrenceReasoning {
            summary: reasoning_summary(result.status, result.error.as_ref()),
            confidence: if known { 0.8 } else { 0.3 },
            memory_context: context.cloned(),
            recommendations: context
                .filter(|c| !c.recommendations.is_empty())
                .map(|c| c.recommendations.clone()),
        })
    };

    let mut steps = Vec::new();
    match result.status {
        DeployStatus::Completed => {
            steps.push(OccurrenceStep {
                step: "apply manifests".to_string(),
                status: "completed".to_string(),
                duration_ms: Some(result.duration_ms),
                error: None,
            });
            if result.verified {
                steps.push(OccurrenceStep {
                    step: "post-deploy verification".to_string(),
                    status: "passed".to_string(),
                    duration_ms: None,
                    error: None,
                });
            }
        }
        DeployStatus::Failed | DeployStatus::RolledBack => {
            steps.push(OccurrenceStep {
                step: "apply manifests".to_string(),
                status: "failed".to_string(),
                duration_ms: Some(result.duration_ms),
                error: result.error.as_ref().map(|e| e.code().to_string()),
            });
            if result.status == DeployStatus::RolledBack {
                steps.push(OccurrenceStep {
                    step: "rollback".to_string(),
                    status: "completed".to_string(),
                    duration_ms: None,
                    error: None,
                });
            }
        }
    }

    Occurrence {
        version: "1.0".to_string(),
        id: id.to_string(),
        timestamp: result.timestamp,
        source: "nopea".to_string(),
        kind: format!("deploy.run.{outcome}"),
        severity: severity_for(result.status).to_string(),
        outcome: outcome.to_string(),
        error,
        reasoning,
        history: OccurrenceHistory {
            steps,
            duration_ms: result.duration_ms,
        },
        deploy_data: OccurrenceDeployData {
            service: result.service.clone(),
            namespace: result.namespace.clone(),
            strategy: result.strategy.to_string(),
            manifests_applied: applied_manifests.len(),
            verified: result.verified,
            deploy_id: Some(result.deploy_id.clone()),
        },
    }
}
