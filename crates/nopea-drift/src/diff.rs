use crate::hash::hash;
use nopea_cache::Cache;
use nopea_core::{resource_key, DeployError, Manifest, ServiceName};
use nopea_k8s::K8sClient;
use serde::{Deserialize, Serialize};

/// Result of a three-way diff between what was last applied by this
/// tool, what's currently desired, and what's actually live
/// (spec.md §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DriftOutcome {
    /// Neither the desired spec nor the live resource moved since the
    /// last apply.
    NoDrift,
    /// No prior apply is on record; resource either doesn't exist yet
    /// or this is the first time nopea has seen it.
    NewResource,
    /// Last-applied is on record but the live resource is gone.
    NeedsApply,
    /// Desired changed (e.g. a new commit) but the cluster didn't.
    GitChange { from: String, to: String },
    /// The cluster changed but the desired manifest (git) didn't —
    /// someone or something edited the live object out of band.
    ManualDrift { expected: String, actual: String },
    /// Both moved independently since the last apply.
    Conflict { last: String, desired: String, live: String },
}

#[must_use]
pub fn three_way_diff(last_applied: &Manifest, desired: &Manifest, live: &Manifest) -> DriftOutcome {
    let last_hash = hash(last_applied);
    let desired_hash = hash(desired);
    let live_hash = hash(live);

    let git_change = desired_hash != last_hash;
    let manual_drift = live_hash != last_hash;

    match (git_change, manual_drift) {
        (false, false) => DriftOutcome::NoDrift,
        (true, false) => DriftOutcome::GitChange {
            from: last_hash,
            to: desired_hash,
        },
        (false, true) => DriftOutcome::ManualDrift {
            expected: last_hash,
            actual: live_hash,
        },
        (true, true) => DriftOutcome::Conflict {
            last: last_hash,
            desired: desired_hash,
            live: live_hash,
        },
    }
}

/// Looks up last-applied in the cache and the live resource via the
/// K8s client, then classifies per spec.md §4.8's outcome table.
pub async fn verify_manifest(
    cache: &Cache,
    k8s: &dyn K8sClient,
    service: &ServiceName,
    desired: &Manifest,
) -> Result<DriftOutcome, DeployError> {
    let key = resource_key(desired);
    let last_applied = cache.get_last_applied(service, &key);

    let api_version = desired.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("v1");
    let kind = desired.get("kind").and_then(|v| v.as_str()).unwrap_or("");
    let name = desired
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let namespace = desired
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|v| v.as_str())
        .unwrap_or(nopea_core::DEFAULT_NAMESPACE);

    let live = k8s.get_resource(api_version, kind, name, namespace).await?;

    match (last_applied, live) {
        (None, None) => Ok(DriftOutcome::NewResource),
        (None, Some(_)) => Ok(DriftOutcome::NeedsApply),
        (Some(_), None) => Ok(DriftOutcome::NewResource),
        (Some(last), Some(live)) => Ok(three_way_diff(&last, desired, &live)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nopea_k8s::NullK8sClient;
    use serde_json::json;

    #[test]
    fn identical_manifests_mean_no_drift() {
        let m = json!({"kind": "ConfigMap", "data": {"k": "v"}});
        assert_eq!(three_way_diff(&m, &m, &m), DriftOutcome::NoDrift);
    }

    #[test]
    fn desired_change_only_is_git_change() {
        let last = json!({"kind": "ConfigMap", "data": {"k": "1"}});
        let desired = json!({"kind": "ConfigMap", "data": {"k": "2"}});
        let live = last.clone();
        assert!(matches!(three_way_diff(&last, &desired, &live), DriftOutcome::GitChange { .. }));
    }

    #[test]
    fn live_change_only_is_manual_drift() {
        let last = json!({"kind": "ConfigMap", "data": {"k": "1"}});
        let desired = last.clone();
        let live = json!({"kind": "ConfigMap", "data": {"k": "edited"}});
        assert!(matches!(three_way_diff(&last, &desired, &live), DriftOutcome::ManualDrift { .. }));
    }

    #[test]
    fn both_changed_is_conflict() {
        let last = json!({"kind": "ConfigMap", "data": {"k": "1"}});
        let desired = json!({"kind": "ConfigMap", "data": {"k": "2"}});
        let live = json!({"kind": "ConfigMap", "data": {"k": "3"}});
        assert!(matches!(three_way_diff(&last, &desired, &live), DriftOutcome::Conflict { .. }));
    }

    #[tokio::test]
    async fn verify_manifest_reports_new_resource_when_both_absent() {
        let cache = Cache::new();
        let k8s = NullK8sClient::new();
        let desired = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "x"}});
        let outcome = verify_manifest(&cache, &k8s, &"svc".to_string(), &desired).await.unwrap();
        assert_eq!(outcome, DriftOutcome::NewResource);
    }

    #[tokio::test]
    async fn verify_manifest_reports_needs_apply_when_live_exists_without_last_applied() {
        let cache = Cache::new();
        let k8s = NullK8sClient::new();
        let desired = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "x"}});
        k8s.seed_live_resource("v1", "ConfigMap", "x", "default", desired.clone());
        let outcome = verify_manifest(&cache, &k8s, &"svc".to_string(), &desired).await.unwrap();
        assert_eq!(outcome, DriftOutcome::NeedsApply);
    }

    #[tokio::test]
    async fn verify_manifest_reports_new_resource_when_live_absent_but_last_applied_present() {
        let cache = Cache::new();
        let k8s = NullK8sClient::new();
        let desired = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "x"}});
        cache.put_last_applied("svc", &resource_key(&desired), desired.clone());
        let outcome = verify_manifest(&cache, &k8s, &"svc".to_string(), &desired).await.unwrap();
        assert_eq!(outcome, DriftOutcome::NewResource);
    }

    #[tokio::test]
    async fn verify_manifest_diffs_three_way_when_both_present() {
        let cache = Cache::new();
        let k8s = NullK8sClient::new();
        let desired = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "x"}});
        cache.put_last_applied("svc", &resource_key(&desired), desired.clone());
        k8s.seed_live_resource("v1", "ConfigMap", "x", "default", desired.clone());
        let outcome = verify_manifest(&cache, &k8s, &"svc".to_string(), &desired).await.unwrap();
        assert_eq!(outcome, DriftOutcome::NoDrift);
    }
}
