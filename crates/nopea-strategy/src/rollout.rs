use nopea_core::{ActiveSlot, DeployOptions, DeployError, Manifest, ServiceName, Strategy};
use serde_json::json;

/// Builds the single "rollout" manifest a progressive-delivery
/// collaborator consumes for `canary`/`blue_green` (spec.md §4.7).
/// Returns [`DeployError::NoDeploymentFound`] if `manifests` contains
/// no `kind: Deployment` entry to seed `spec` from.
pub fn build_rollout_manifest(
    strategy: Strategy,
    service: &ServiceName,
    namespace: &str,
    manifests: &[Manifest],
    options: &DeployOptions,
) -> Result<Manifest, DeployError> {
    let deployment = manifests
        .iter()
        .find(|m| m.get("kind").and_then(|v| v.as_str()) == Some("Deployment"))
        .ok_or(DeployError::NoDeploymentFound)?;

    let replicas = deployment.get("spec").and_then(|s| s.get("replicas")).cloned().unwrap_or(json!(1));
    let selector = deployment
        .get("spec")
        .and_then(|s| s.get("selector"))
        .cloned()
        .unwrap_or(json!({}));
    let template = deployment
        .get("spec")
        .and_then(|s| s.get("template"))
        .cloned()
        .unwrap_or(json!({}));

    let strategy_section = match strategy {
        Strategy::Canary => json!({
            "canary": {
                "steps": options.canary_steps.iter().map(|w| json!({"setWeight": w})).collect::<Vec<_>>(),
                "canaryService": format!("{service}-canary"),
                "stableService": service,
            }
        }),
        Strategy::BlueGreen => json!({
            "blueGreen": {
                "activeService": service,
                "previewService": format!("{service}-preview"),
            }
        }),
        Strategy::Direct => return Err(DeployError::Other("direct is not a rollout strategy".into())),
    };

    Ok(json!({
        "apiVersion": "kulta.io/v1alpha1",
        "kind": "Rollout",
        "metadata": {
            "name": service,
            "namespace": namespace,
            "labels": {"app.kubernetes.io/managed-by": "nopea"},
        },
        "spec": {
            "replicas": replicas,
            "selector": selector,
            "template": template,
            "strategy": strategy_section,
        },
    }))
}

/// Which slot a blue/green rollout is currently routing to; carried in
/// [`DeployOptions::active_slot`] purely as caller-supplied state —
/// this crate doesn't flip it, the progressive-delivery collaborator
/// does (spec.md §3).
#[must_use]
pub fn active_slot_label(slot: ActiveSlot) -> &'static str {
    match slot {
        ActiveSlot::Blue => "blue",
        ActiveSlot::Green => "green",
    }
}
