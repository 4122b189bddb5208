//! Rollout strategies (spec.md §4.7): `direct` applies manifests
//! as-is; `canary`/`blue_green` translate a deploy spec into a single
//! rollout manifest for an external progressive-delivery collaborator.

pub mod rollout;

pub use rollout::{active_slot_label, build_rollout_manifest};

use nopea_core::{DeployError, DeployOptions, Manifest, ServiceName, Strategy};
use nopea_k8s::K8sClient;

/// Executes the strategy and returns the sequence of manifests that
/// were actually applied (spec.md §4.7).
pub async fn execute(
    k8s: &dyn K8sClient,
    strategy: Strategy,
    service: &ServiceName,
    namespace: &str,
    manifests: &[Manifest],
    options: &DeployOptions,
) -> Result<Vec<Manifest>, DeployError> {
    match strategy {
        Strategy::Direct => k8s.apply_manifests(manifests, namespace).await,
        Strategy::Canary | Strategy::BlueGreen => {
            let rollout = build_rollout_manifest(strategy, service, namespace, manifests, options)?;
            let applied = k8s.apply_manifest(&rollout, namespace).await?;
            Ok(vec![applied])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nopea_k8s::NullK8sClient;
    use serde_json::json;

    #[tokio::test]
    async fn direct_applies_all_manifests() {
        let k8s = NullK8sClient::new();
        let manifests = vec![json!({"kind": "Deployment"}), json!({"kind": "Service"})];
        let applied = execute(
            &k8s,
            Strategy::Direct,
            &"api-gw".to_string(),
            "production",
            &manifests,
            &DeployOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(applied.len(), 2);
    }

    #[tokio::test]
    async fn canary_applies_single_rollout_manifest() {
        let k8s = NullK8sClient::new();
        let manifests = vec![json!({"kind": "Deployment", "spec": {"replicas": 1}})];
        let applied = execute(
            &k8s,
            Strategy::Canary,
            &"api-gw".to_string(),
            "production",
            &manifests,
            &DeployOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0]["kind"], "Rollout");
    }
}
