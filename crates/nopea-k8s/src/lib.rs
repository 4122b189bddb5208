//! The Kubernetes collaborator interface the core consumes (spec.md
//! §1, §6). The real server-side-apply client is an external
//! collaborator out of scope for this crate; what lives here is the
//! trait boundary plus an in-process test double good enough to drive
//! the orchestrator, drift engine, and strategies in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use nopea_core::{DeployError, Manifest};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the core needs the K8s client to provide (spec.md §6).
#[async_trait]
pub trait K8sClient: Send + Sync {
    async fn apply_manifests(
        &self,
        manifests: &[Manifest],
        namespace: &str,
    ) -> Result<Vec<Manifest>, DeployError>;

    async fn apply_manifest(&self, manifest: &Manifest, namespace: &str) -> Result<Manifest, DeployError>;

    async fn get_resource(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Manifest>, DeployError>;

    async fn delete_resource(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<(), DeployError>;
}

fn resource_lookup_key(api_version: &str, kind: &str, name: &str, namespace: &str) -> String {
    format!("{api_version}/{kind}/{namespace}/{name}")
}

/// An in-process test double. Applies are recorded and echoed back as
/// "applied"; live resources are whatever was pre-seeded with
/// [`NullK8sClient::seed_live_resource`] — by default nothing exists,
/// so `get_resource` returns `Ok(None)` (spec.md §4.8 "both absent").
#[derive(Debug, Default)]
pub struct NullK8sClient {
    live: DashMap<String, Manifest>,
    apply_calls: AtomicUsize,
}

impl NullK8sClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_live_resource(&self, api_version: &str, kind: &str, name: &str, namespace: &str, manifest: Manifest) {
        self.live
            .insert(resource_lookup_key(api_version, kind, name, namespace), manifest);
    }

    #[must_use]
    pub fn apply_call_count(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl K8sClient for NullK8sClient {
    async fn apply_manifests(
        &self,
        manifests: &[Manifest],
        namespace: &str,
    ) -> Result<Vec<Manifest>, DeployError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        for manifest in manifests {
            record_apply(&self.live, manifest, namespace);
        }
        Ok(manifests.to_vec())
    }

    async fn apply_manifest(&self, manifest: &Manifest, namespace: &str) -> Result<Manifest, DeployError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        record_apply(&self.live, manifest, namespace);
        Ok(manifest.clone())
    }

    async fn get_resource(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Manifest>, DeployError> {
        Ok(self
            .live
            .get(&resource_lookup_key(api_version, kind, name, namespace))
            .map(|entry| entry.value().clone()))
    }

    async fn delete_resource(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<(), DeployError> {
        self.live.remove(&resource_lookup_key(api_version, kind, name, namespace));
        Ok(())
    }
}

fn record_apply(live: &DashMap<String, Manifest>, manifest: &Manifest, namespace: &str) {
    let api_version = manifest.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("v1");
    let kind = manifest.get("kind").and_then(|v| v.as_str()).unwrap_or("");
    let name = manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    live.insert(resource_lookup_key(api_version, kind, name, namespace), manifest.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_resource_returns_none_when_absent() {
        let client = NullK8sClient::new();
        let result = client.get_resource("apps/v1", "Deployment", "api", "default").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn apply_manifest_makes_it_visible_to_get_resource() {
        let client = NullK8sClient::new();
        let manifest = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "api"}
        });
        client.apply_manifest(&manifest, "default").await.unwrap();
        let fetched = client
            .get_resource("apps/v1", "Deployment", "api", "default")
            .await
            .unwrap();
        assert_eq!(fetched, Some(manifest));
    }

    #[tokio::test]
    async fn apply_call_count_is_tracked() {
        let client = NullK8sClient::new();
        client.apply_manifests(&[], "default").await.unwrap();
        client.apply_manifests(&[], "default").await.unwrap();
        assert_eq!(client.apply_call_count(), 2);
    }
}
