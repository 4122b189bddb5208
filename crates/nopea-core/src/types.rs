use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeployError;

/// An arbitrary Kubernetes resource object, already parsed from YAML
/// into a structured JSON value. Manifest parsing itself is an
/// external collaborator (spec.md §1); the core only ever reads and
/// rewrites fields on values handed to it.
pub type Manifest = serde_json::Value;

/// `service`/`namespace` are plain strings rather than newtypes: the
/// core never validates their shape (that belongs to the manifest
/// parser, an external collaborator), it only uses them as map keys
/// and string-interpolates them into evidence/log text.
pub type ServiceName = String;
pub type Namespace = String;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_CANARY_STEPS: &[u32] = &[10, 25, 50, 75, 100];

/// Rollout strategy (spec.md §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Canary,
    BlueGreen,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::Canary => "canary",
            Self::BlueGreen => "blue_green",
        })
    }
}

impl Strategy {
    /// Parse a strategy string, per spec.md REDESIGN FLAG / Open
    /// Question (i): unknown values are coerced to `direct` rather
    /// than rejected. Callers that need to log the coercion should
    /// compare the input against `Self::parse(s).to_string()`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "direct" => Self::Direct,
            "canary" => Self::Canary,
            "blue_green" | "blue-green" => Self::BlueGreen,
            _ => Self::Direct,
        }
    }
}

/// The active slot for a blue/green rollout (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActiveSlot {
    #[default]
    Blue,
    Green,
}

/// Strategy-specific knobs (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployOptions {
    pub canary_steps: Vec<u32>,
    pub active_slot: ActiveSlot,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            canary_steps: DEFAULT_CANARY_STEPS.to_vec(),
            active_slot: ActiveSlot::default(),
        }
    }
}

impl DeployOptions {
    /// `canary_steps` must be strictly monotone increasing, each in
    /// `(0, 100]`, with the last step equal to 100 (spec.md §3).
    pub fn validate(&self) -> Result<(), String> {
        if self.canary_steps.is_empty() {
            return Err("canary_steps must not be empty".into());
        }
        if self.canary_steps.last() != Some(&100) {
            return Err("canary_steps must end at 100".into());
        }
        let mut prev = 0u32;
        for &step in &self.canary_steps {
            if step == 0 || step > 100 {
                return Err(format!("canary step {step} out of range (0,100]"));
            }
            if step <= prev {
                return Err("canary_steps must be strictly increasing".into());
            }
            prev = step;
        }
        Ok(())
    }
}

/// A deploy specification (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySpec {
    pub service: ServiceName,
    #[serde(default = "default_namespace")]
    pub namespace: Namespace,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub options: DeployOptions,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_namespace() -> Namespace {
    DEFAULT_NAMESPACE.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Outcome of a completed deploy lifecycle (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Completed,
    Failed,
    RolledBack,
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolledback",
        })
    }
}

/// A deploy result (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResult {
    pub deploy_id: String,
    pub service: ServiceName,
    pub namespace: Namespace,
    pub status: DeployStatus,
    pub strategy: Strategy,
    pub manifest_count: usize,
    pub duration_ms: u64,
    pub verified: bool,
    pub error: Option<DeployError>,
    pub applied_resources: Vec<Manifest>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A single `service --breaks--> error` edge surfaced by a deploy
/// context query (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePattern {
    pub error: String,
    pub confidence: f64,
    pub observations: u64,
    pub evidence: Vec<String>,
}

/// A single `service --depends_on--> target` edge (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub target_name: String,
    pub weight: f64,
    pub observations: u64,
}

/// What the orchestrator asks Memory for before selecting a strategy
/// (spec.md §4.3, §4.5). `known = false` means the service has no
/// node in the graph yet (or Memory itself is absent) — every list is
/// simply empty in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployContext {
    pub service: ServiceName,
    pub namespace: Namespace,
    pub known: bool,
    pub failure_patterns: Vec<FailurePattern>,
    pub dependencies: Vec<Dependency>,
    pub recommendations: Vec<String>,
}

impl DeployContext {
    #[must_use]
    pub fn empty(service: &ServiceName, namespace: &Namespace) -> Self {
        Self {
            service: service.clone(),
            namespace: namespace.clone(),
            known: false,
            failure_patterns: Vec::new(),
            dependencies: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// The strategy auto-selection rule in spec.md §4.6 step 3: canary
    /// iff any failure pattern crosses the 0.15 confidence threshold.
    #[must_use]
    pub fn suggests_canary(&self) -> bool {
        self.failure_patterns.iter().any(|p| p.confidence > 0.15)
    }
}

/// `resource_key = "{kind}/{namespace}/{name}"` (spec.md §3), used as
/// the second half of the `last_applied` cache key.
#[must_use]
pub fn resource_key(manifest: &Manifest) -> String {
    let kind = manifest.get("kind").and_then(|v| v.as_str()).unwrap_or("");
    let namespace = manifest
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_NAMESPACE);
    let name = manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    format!("{kind}/{namespace}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_strategy_coerces_to_direct() {
        assert_eq!(Strategy::parse("bogus"), Strategy::Direct);
        assert_eq!(Strategy::parse("canary"), Strategy::Canary);
        assert_eq!(Strategy::parse("blue_green"), Strategy::BlueGreen);
    }

    #[test]
    fn canary_steps_reject_non_monotone() {
        let opts = DeployOptions {
            canary_steps: vec![10, 10, 100],
            active_slot: ActiveSlot::Blue,
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn canary_steps_reject_missing_terminal_100() {
        let opts = DeployOptions {
            canary_steps: vec![10, 50],
            active_slot: ActiveSlot::Blue,
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn default_canary_steps_are_valid() {
        assert!(DeployOptions::default().validate().is_ok());
    }

    #[test]
    fn resource_key_matches_spec_format() {
        let m = json!({
            "kind": "Deployment",
            "metadata": {"name": "api", "namespace": "prod"}
        });
        assert_eq!(resource_key(&m), "Deployment/prod/api");
    }

    #[test]
    fn resource_key_defaults_namespace() {
        let m = json!({"kind": "Service", "metadata": {"name": "api"}});
        assert_eq!(resource_key(&m), "Service/default/api");
    }
}
