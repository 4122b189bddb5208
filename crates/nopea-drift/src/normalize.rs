//! Strips volatile, cluster-managed fields so two manifests that only
//! differ by server-populated noise hash identically (spec.md §4.8).

use nopea_core::Manifest;
use serde_json::Value;

const METADATA_FIELDS: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
    "managedFields",
    "selfLink",
    "namespace",
];

const ANNOTATION_FIELDS: &[&str] = &[
    "kubectl.kubernetes.io/last-applied-configuration",
    "deployment.kubernetes.io/revision",
];

const POD_SPEC_FIELDS: &[&str] = &[
    "dnsPolicy",
    "restartPolicy",
    "schedulerName",
    "securityContext",
    "terminationGracePeriodSeconds",
];

const CONTAINER_FIELDS: &[&str] = &["terminationMessagePath", "terminationMessagePolicy"];

const PROBE_FIELDS: &[&str] = &["failureThreshold", "periodSeconds", "successThreshold"];

const SERVICE_SPEC_FIELDS: &[&str] = &[
    "clusterIP",
    "clusterIPs",
    "internalTrafficPolicy",
    "ipFamilies",
    "ipFamilyPolicy",
    "sessionAffinity",
];

/// Returns a normalized copy; the input is never mutated in place so
/// callers can normalize the same manifest for multiple purposes.
#[must_use]
pub fn normalize(manifest: &Manifest) -> Manifest {
    let mut m = manifest.clone();
    let Some(obj) = m.as_object_mut() else {
        return m;
    };

    obj.remove("status");

    if let Some(metadata) = obj.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in METADATA_FIELDS {
            metadata.remove(*field);
        }
        strip_annotations(metadata);
    }

    match obj.get("kind").and_then(Value::as_str) {
        Some("Deployment") => normalize_deployment(obj),
        Some("Service") => normalize_service(obj),
        _ => {}
    }

    m
}

fn strip_annotations(metadata: &mut serde_json::Map<String, Value>) {
    let drop_empty = if let Some(annotations) = metadata.get_mut("annotations").and_then(Value::as_object_mut) {
        for field in ANNOTATION_FIELDS {
            annotations.remove(*field);
        }
        annotations.is_empty()
    } else {
        false
    };
    if drop_empty {
        metadata.remove("annotations");
    }
}

fn normalize_deployment(obj: &mut serde_json::Map<String, Value>) {
    let Some(spec) = obj.get_mut("spec").and_then(Value::as_object_mut) else {
        return;
    };
    spec.remove("replicas");
    if let Some(strategy) = spec.get_mut("strategy").and_then(Value::as_object_mut) {
        if let Some(rolling_update) = strategy.get_mut("rollingUpdate").and_then(Value::as_object_mut) {
            rolling_update.remove("maxSurge");
        }
    }

    let Some(pod_spec) = spec
        .get_mut("template")
        .and_then(Value::as_object_mut)
        .and_then(|t| t.get_mut("spec"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    for field in POD_SPEC_FIELDS {
        pod_spec.remove(*field);
    }

    let Some(containers) = pod_spec.get_mut("containers").and_then(Value::as_array_mut) else {
        return;
    };
    for container in containers {
        let Some(container) = container.as_object_mut() else { continue };
        for field in CONTAINER_FIELDS {
            container.remove(*field);
        }
        for probe_key in ["livenessProbe", "readinessProbe"] {
            if let Some(probe) = container.get_mut(probe_key).and_then(Value::as_object_mut) {
                for field in PROBE_FIELDS {
                    probe.remove(*field);
                }
            }
        }
        normalize_cpu_limit(container);
    }
}

/// `"2000m"` → `"2"` when the milli-value is an exact whole core
/// count; any other shape (fractional cores, already-bare number) is
/// left untouched.
fn normalize_cpu_limit(container: &mut serde_json::Map<String, Value>) {
    let Some(cpu) = container
        .get_mut("resources")
        .and_then(Value::as_object_mut)
        .and_then(|r| r.get_mut("limits"))
        .and_then(Value::as_object_mut)
        .and_then(|l| l.get_mut("cpu"))
    else {
        return;
    };
    let Some(raw) = cpu.as_str() else { return };
    let Some(milli) = raw.strip_suffix('m').and_then(|v| v.parse::<u64>().ok()) else {
        return;
    };
    if milli % 1000 == 0 {
        *cpu = Value::String((milli / 1000).to_string());
    }
}

fn normalize_service(obj: &mut serde_json::Map<String, Value>) {
    let Some(spec) = obj.get_mut("spec").and_then(Value::as_object_mut) else {
        return;
    };
    for field in SERVICE_SPEC_FIELDS {
        spec.remove(*field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_top_level_status() {
        let m = json!({"kind": "Pod", "status": {"phase": "Running"}});
        assert!(normalize(&m).get("status").is_none());
    }

    #[test]
    fn strips_metadata_volatiles() {
        let m = json!({
            "kind": "ConfigMap",
            "metadata": {"name": "x", "resourceVersion": "123", "uid": "abc", "namespace": "default"}
        });
        let n = normalize(&m);
        let metadata = n["metadata"].as_object().unwrap();
        assert!(!metadata.contains_key("resourceVersion"));
        assert!(!metadata.contains_key("uid"));
        assert!(!metadata.contains_key("namespace"));
        assert_eq!(metadata["name"], "x");
    }

    #[test]
    fn drops_empty_annotations_map() {
        let m = json!({
            "kind": "ConfigMap",
            "metadata": {"annotations": {"kubectl.kubernetes.io/last-applied-configuration": "{}"}}
        });
        let n = normalize(&m);
        assert!(!n["metadata"].as_object().unwrap().contains_key("annotations"));
    }

    #[test]
    fn keeps_non_volatile_annotations() {
        let m = json!({
            "kind": "ConfigMap",
            "metadata": {"annotations": {"team": "platform"}}
        });
        let n = normalize(&m);
        assert_eq!(n["metadata"]["annotations"]["team"], "platform");
    }

    #[test]
    fn normalizes_deployment_fields() {
        let m = json!({
            "kind": "Deployment",
            "spec": {
                "replicas": 3,
                "strategy": {"rollingUpdate": {"maxSurge": "25%"}},
                "template": {
                    "spec": {
                        "dnsPolicy": "ClusterFirst",
                        "containers": [{
                            "terminationMessagePath": "/dev/termination-log",
                            "livenessProbe": {"failureThreshold": 3, "initialDelaySeconds": 5},
                            "resources": {"limits": {"cpu": "2000m"}}
                        }]
                    }
                }
            }
        });
        let n = normalize(&m);
        let spec = &n["spec"];
        assert!(spec.get("replicas").is_none());
        assert!(spec["strategy"]["rollingUpdate"].get("maxSurge").is_none());
        let pod_spec = &spec["template"]["spec"];
        assert!(pod_spec.get("dnsPolicy").is_none());
        let container = &pod_spec["containers"][0];
        assert!(container.get("terminationMessagePath").is_none());
        assert!(container["livenessProbe"].get("failureThreshold").is_none());
        assert_eq!(container["livenessProbe"]["initialDelaySeconds"], 5);
        assert_eq!(container["resources"]["limits"]["cpu"], "2");
    }

    #[test]
    fn cpu_limit_left_alone_when_not_whole_core() {
        let m = json!({
            "kind": "Deployment",
            "spec": {"template": {"spec": {"containers": [{"resources": {"limits": {"cpu": "1500m"}}}]}}}
        });
        let n = normalize(&m);
        assert_eq!(n["spec"]["template"]["spec"]["containers"][0]["resources"]["limits"]["cpu"], "1500m");
    }

    #[test]
    fn normalizes_service_fields() {
        let m = json!({
            "kind": "Service",
            "spec": {"clusterIP": "10.0.0.1", "sessionAffinity": "None", "ports": [{"port": 80}]}
        });
        let n = normalize(&m);
        let spec = &n["spec"];
        assert!(spec.get("clusterIP").is_none());
        assert!(spec.get("sessionAffinity").is_none());
        assert_eq!(spec["ports"][0]["port"], 80);
    }

    #[test]
    fn normalize_is_idempotent() {
        let m = json!({
            "kind": "Deployment",
            "metadata": {"resourceVersion": "1"},
            "spec": {"replicas": 2, "template": {"spec": {"containers": []}}}
        });
        let once = normalize(&m);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }
}
