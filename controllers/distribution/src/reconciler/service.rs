//! Detection of external changes to managed Services.
//!
//! Before a Service is re-applied, its network-facing fields are compared
//! against the desired state. Differences mean someone edited the Service
//! outside the operator; they are logged and then overwritten.

use cluster_client::Manifest;
use serde_json::Value;
use tracing::warn;

/// Warns about every network-facing field of the fetched `live` Service that
/// differs from `desired`, and returns those field names.
pub fn check_and_log_service_changes(live: &Manifest, desired: &Manifest) -> Vec<&'static str> {
    let changed = changed_service_fields(live, desired);
    for field in &changed {
        warn!(
            "Service {} field {} was changed outside the operator and will be overwritten",
            desired, field
        );
    }
    changed
}

/// Names of the fields of `desired` that `live` does not match.
pub fn changed_service_fields(live: &Manifest, desired: &Manifest) -> Vec<&'static str> {
    let mut changed = Vec::new();

    if let Some(want) = desired.pointer("/spec/ports").and_then(Value::as_array) {
        let have = live
            .pointer("/spec/ports")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if !ports_match(have, want) {
            changed.push("spec.ports");
        }
    }

    if let Some(want) = desired.pointer("/spec/selector") {
        if live.pointer("/spec/selector") != Some(want) {
            changed.push("spec.selector");
        }
    }

    // The API server defaults the type to ClusterIP.
    let want_type = desired
        .pointer("/spec/type")
        .and_then(Value::as_str)
        .unwrap_or("ClusterIP");
    let have_type = live
        .pointer("/spec/type")
        .and_then(Value::as_str)
        .unwrap_or("ClusterIP");
    if want_type != have_type {
        changed.push("spec.type");
    }

    changed
}

/// Compares only the fields the operator sets; the API server fills in
/// protocol and node ports on its own.
fn ports_match(have: &[Value], want: &[Value]) -> bool {
    have.len() == want.len()
        && have.iter().zip(want).all(|(h, w)| {
            ["name", "port", "targetPort"]
                .iter()
                .all(|key| w.get(key).is_none() || h.get(key) == w.get(key))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::manifest;
    use serde_json::json;

    fn service(port: i64, instance: &str, extra: Value) -> Manifest {
        let mut doc = json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "demo-service", "namespace": "ns1"},
            "spec": {
                "ports": [{"name": "http", "port": port, "targetPort": port}],
                "selector": {"app.kubernetes.io/instance": instance}
            }
        });
        if let (Some(spec), Some(extra)) = (doc["spec"].as_object_mut(), extra.as_object()) {
            spec.extend(extra.clone());
        }
        manifest(doc)
    }

    #[test]
    fn test_server_defaults_are_not_changes() {
        let mut live = service(9000, "demo", json!({"type": "ClusterIP"}));
        live.value_mut()["spec"]["ports"][0]["protocol"] = json!("TCP");
        let desired = service(9000, "demo", json!({}));
        assert!(changed_service_fields(&live, &desired).is_empty());
    }

    #[test]
    fn test_detects_port_selector_and_type_changes() {
        let live = service(8080, "someone-else", json!({"type": "NodePort"}));
        let desired = service(9000, "demo", json!({}));
        assert_eq!(
            changed_service_fields(&live, &desired),
            vec!["spec.ports", "spec.selector", "spec.type"]
        );
    }

    #[test]
    fn test_matching_service_reports_nothing() {
        let live = service(9000, "demo", json!({}));
        assert!(check_and_log_service_changes(&live, &live.clone()).is_empty());
    }

    #[test]
    fn test_reports_changes_against_live_service() {
        let live = service(8080, "demo", json!({}));
        let desired = service(9000, "demo", json!({}));
        assert_eq!(check_and_log_service_changes(&live, &desired), vec!["spec.ports"]);
    }
}
