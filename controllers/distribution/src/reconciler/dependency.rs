//! Dependency validation for RBAC bindings.
//!
//! A binding whose role does not exist yet is skipped instead of being
//! created dangling. Resources are converged in render order, so a role
//! rendered before its binding already exists by the time the binding is
//! checked.

use cluster_client::{gvk_from_api_version, ClusterClientTrait, ClusterError, Manifest};
use serde_json::Value;
use tracing::debug;

const RBAC_API_VERSION: &str = "rbac.authorization.k8s.io/v1";

/// Returns `Ok(true)` when `resource` references a role that does not exist
/// and must therefore be skipped. Resources without such a reference, or
/// with an empty role name, return `Ok(false)`.
pub async fn check_dependency_exists(
    client: &dyn ClusterClientTrait,
    resource: &Manifest,
) -> Result<bool, ClusterError> {
    let role_namespace = match resource.kind() {
        "ClusterRoleBinding" => None,
        "RoleBinding" => resource.namespace(),
        _ => return Ok(false),
    };

    let role_name = resource
        .pointer("/roleRef/name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if role_name.is_empty() {
        return Ok(false);
    }

    // A ClusterRoleBinding can only reference a ClusterRole; a RoleBinding may
    // reference either, and a Role lives in the binding's namespace.
    let role_kind = match (resource.kind(), resource.pointer("/roleRef/kind").and_then(Value::as_str)) {
        ("RoleBinding", Some("Role")) => "Role",
        _ => "ClusterRole",
    };
    let namespace = if role_kind == "Role" { role_namespace } else { None };

    let gvk = gvk_from_api_version(RBAC_API_VERSION, role_kind);
    match client.get(&gvk, namespace, role_name).await {
        Ok(_) => Ok(false),
        Err(e) if e.is_not_found() => {
            debug!("{} {} referenced by {} not found", role_kind, role_name, resource);
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::manifest;
    use cluster_client::{MockClusterClient, MockVerb};
    use serde_json::json;

    fn binding(kind: &str, role_kind: &str, role_name: &str) -> Manifest {
        manifest(json!({
            "apiVersion": RBAC_API_VERSION,
            "kind": kind,
            "metadata": {"name": "demo-binding", "namespace": "ns1"},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": role_kind, "name": role_name},
            "subjects": [{"kind": "ServiceAccount", "name": "demo-sa", "namespace": "ns1"}]
        }))
    }

    fn role(kind: &str, name: &str, namespace: Option<&str>) -> Manifest {
        let mut doc = json!({"apiVersion": RBAC_API_VERSION, "kind": kind, "metadata": {"name": name}});
        if let Some(ns) = namespace {
            doc["metadata"]["namespace"] = json!(ns);
        }
        manifest(doc)
    }

    #[tokio::test]
    async fn test_missing_cluster_role_skips() {
        let mock = MockClusterClient::new();
        let crb = binding("ClusterRoleBinding", "ClusterRole", "anyuid");
        assert!(check_dependency_exists(&mock, &crb).await.unwrap());

        mock.add_object(role("ClusterRole", "anyuid", None));
        assert!(!check_dependency_exists(&mock, &crb).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_role_name_is_not_checked() {
        let mock = MockClusterClient::new();
        let crb = binding("ClusterRoleBinding", "ClusterRole", "");
        assert!(!check_dependency_exists(&mock, &crb).await.unwrap());
        assert!(mock.calls_for(MockVerb::Get).is_empty());
    }

    #[tokio::test]
    async fn test_role_binding_looks_in_its_namespace() {
        let mock = MockClusterClient::new();
        mock.add_object(role("Role", "reader", Some("other")));
        let rb = binding("RoleBinding", "Role", "reader");
        assert!(check_dependency_exists(&mock, &rb).await.unwrap());

        mock.add_object(role("Role", "reader", Some("ns1")));
        assert!(!check_dependency_exists(&mock, &rb).await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let mock = MockClusterClient::new();
        mock.fail_on(MockVerb::Get, "anyuid", "forbidden");
        let crb = binding("ClusterRoleBinding", "ClusterRole", "anyuid");
        assert!(check_dependency_exists(&mock, &crb).await.is_err());
    }

    #[tokio::test]
    async fn test_other_kinds_have_no_dependency() {
        let mock = MockClusterClient::new();
        let svc = manifest(json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "s"}}));
        assert!(!check_dependency_exists(&mock, &svc).await.unwrap());
    }
}
