//! Field mappings derived from a ServerDistribution.

use crds::{ServerDistribution, DEFAULT_SERVER_PORT, DEFAULT_STORAGE_SIZE, INSTANCE_LABEL};
use kube::ResourceExt;
use manifests::FieldMapping;
use serde_json::{json, Value};

/// Namespace selected by the NetworkPolicy when the operator namespace is unknown.
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "distro-operator-system";

/// Suffix of the ServiceAccount name rendered for each instance.
pub const SERVICE_ACCOUNT_SUFFIX: &str = "sa";

/// JSON pointer to the instance label under the label map at `prefix`.
fn instance_label_pointer(prefix: &str) -> String {
    let escaped = INSTANCE_LABEL.replace('~', "~0").replace('/', "~1");
    format!("{prefix}/{escaped}")
}

/// The ordered mapping rules for one owner object.
pub fn build_field_mappings(dist: &ServerDistribution, operator_namespace: &str) -> Vec<FieldMapping> {
    let name = json!(dist.name_any());
    let namespace = dist.namespace().map(Value::String);
    let port = dist.server_port().map(|p| json!(p));
    let storage = dist.storage_size().map(|s| json!(s));
    let operator_ns = Some(json!(operator_namespace));
    let service_account = json!(format!("{}-{SERVICE_ACCOUNT_SUFFIX}", dist.name_any()));

    vec![
        FieldMapping::new("PersistentVolumeClaim", "/spec/resources/requests/storage", storage)
            .with_default(DEFAULT_STORAGE_SIZE),
        FieldMapping::new("Service", "/spec/ports/0/port", port.clone()).with_default(DEFAULT_SERVER_PORT),
        FieldMapping::new("Service", "/spec/ports/0/targetPort", port.clone()).with_default(DEFAULT_SERVER_PORT),
        FieldMapping::new("Service", &instance_label_pointer("/spec/selector"), Some(name.clone())),
        FieldMapping::new(
            "NetworkPolicy",
            &instance_label_pointer("/spec/podSelector/matchLabels"),
            Some(name.clone()),
        ),
        // The Deployment keeps the bare instance name.
        FieldMapping::new("Deployment", "/metadata/name", Some(name.clone())),
        FieldMapping::new(
            "Deployment",
            &instance_label_pointer("/spec/selector/matchLabels"),
            Some(name.clone()),
        ),
        FieldMapping::new(
            "Deployment",
            &instance_label_pointer("/spec/template/metadata/labels"),
            Some(name),
        ),
        FieldMapping::new("Deployment", "/spec/replicas", Some(json!(dist.spec.replicas))),
        FieldMapping::new("NetworkPolicy", "/spec/ingress/0/ports/0/port", port.clone())
            .with_default(DEFAULT_SERVER_PORT),
        FieldMapping::new("NetworkPolicy", "/spec/ingress/1/ports/0/port", port)
            .with_default(DEFAULT_SERVER_PORT),
        FieldMapping::new(
            "NetworkPolicy",
            "/spec/ingress/1/from/0/namespaceSelector/matchLabels/kubernetes.io~1metadata.name",
            operator_ns,
        )
        .with_default(DEFAULT_OPERATOR_NAMESPACE),
        FieldMapping::new("ClusterRoleBinding", "/subjects/0/namespace", namespace.clone()),
        FieldMapping::new("RoleBinding", "/subjects/0/namespace", namespace),
        // Binding subjects follow the prefixed ServiceAccount name.
        FieldMapping::new("ClusterRoleBinding", "/subjects/0/name", Some(service_account.clone())),
        FieldMapping::new("RoleBinding", "/subjects/0/name", Some(service_account)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_distribution, manifest};
    use crds::StorageSpec;
    use manifests::apply_mappings;

    #[test]
    fn test_defaults_fill_unset_spec_fields() {
        let dist = create_test_distribution("demo", "ns1", "uid-1");
        let mut resources = vec![
            manifest(json!({"apiVersion": "v1", "kind": "PersistentVolumeClaim", "metadata": {"name": "demo-pvc"}})),
            manifest(json!({
                "apiVersion": "networking.k8s.io/v1", "kind": "NetworkPolicy",
                "metadata": {"name": "demo-np"},
                "spec": {"ingress": [{"ports": [{"port": 1}]}, {"from": [{}], "ports": [{"port": 1}]}]}
            })),
        ];
        apply_mappings(&mut resources, &build_field_mappings(&dist, "")).unwrap();

        assert_eq!(resources[0].pointer("/spec/resources/requests/storage"), Some(&json!("10Gi")));
        assert_eq!(resources[1].pointer("/spec/ingress/0/ports/0/port"), Some(&json!(8321)));
        assert_eq!(resources[1].pointer("/spec/ingress/1/ports/0/port"), Some(&json!(8321)));
        assert_eq!(
            resources[1].pointer("/spec/ingress/1/from/0/namespaceSelector/matchLabels/kubernetes.io~1metadata.name"),
            Some(&json!("distro-operator-system"))
        );
        assert_eq!(
            resources[1].pointer("/spec/podSelector/matchLabels/app.kubernetes.io~1instance"),
            Some(&json!("demo"))
        );
    }

    #[test]
    fn test_spec_values_win() {
        let mut dist = create_test_distribution("demo", "ns1", "uid-1");
        dist.spec.replicas = 3;
        dist.spec.server.container_spec.port = Some(9000);
        dist.spec.server.storage = Some(StorageSpec {
            size: Some("20Gi".to_string()),
            mount_path: None,
        });
        let mut resources = vec![
            manifest(json!({"apiVersion": "v1", "kind": "PersistentVolumeClaim", "metadata": {"name": "pvc"}})),
            manifest(json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "server"}})),
            manifest(json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "svc"}})),
        ];
        apply_mappings(&mut resources, &build_field_mappings(&dist, "ops")).unwrap();

        assert_eq!(resources[0].pointer("/spec/resources/requests/storage"), Some(&json!("20Gi")));
        assert_eq!(resources[1].name(), "demo");
        assert_eq!(resources[1].pointer("/spec/replicas"), Some(&json!(3)));
        assert_eq!(resources[2].pointer("/spec/ports/0/targetPort"), Some(&json!(9000)));
    }

    #[test]
    fn test_instance_label_pointer_escapes_the_slash() {
        assert_eq!(
            instance_label_pointer("/spec/selector"),
            "/spec/selector/app.kubernetes.io~1instance"
        );
    }

    #[test]
    fn test_binding_subject_points_at_instance() {
        let dist = create_test_distribution("demo", "ns1", "uid-1");
        let mut resources = vec![manifest(json!({
            "apiVersion": "rbac.authorization.k8s.io/v1", "kind": "ClusterRoleBinding",
            "metadata": {"name": "demo-scc"},
            "subjects": [{"kind": "ServiceAccount", "name": "sa"}]
        }))];
        apply_mappings(&mut resources, &build_field_mappings(&dist, "")).unwrap();
        assert_eq!(
            resources[0].pointer("/subjects/0"),
            Some(&json!({"kind": "ServiceAccount", "name": "demo-sa", "namespace": "ns1"}))
        );
    }
}
