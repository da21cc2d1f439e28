//! Integration tests for the Kubernetes cluster client
//!
//! These tests require a reachable cluster (current kubeconfig context).
//! Set TEST_NAMESPACE to choose the namespace used (default: "default").

use cluster_client::{gvk_from_api_version, ClusterClientTrait, KubeClusterClient, Manifest};
use serde_json::json;

async fn client() -> KubeClusterClient {
    let client = kube::Client::try_default()
        .await
        .expect("Failed to create Kubernetes client");
    KubeClusterClient::new(client)
}

fn namespace() -> String {
    std::env::var("TEST_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

fn config_map(name: &str, value: &str) -> Manifest {
    Manifest::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name, "namespace": namespace()},
        "data": {"key": value}
    }))
    .expect("valid ConfigMap")
}

#[tokio::test]
#[ignore] // Requires a running cluster
async fn test_scope_discovery() {
    let client = client().await;

    let crb = gvk_from_api_version("rbac.authorization.k8s.io/v1", "ClusterRoleBinding");
    let svc = gvk_from_api_version("v1", "Service");
    assert!(client.is_cluster_scoped(&crb).await.expect("discovery"));
    assert!(!client.is_cluster_scoped(&svc).await.expect("discovery"));
}

#[tokio::test]
#[ignore]
async fn test_missing_object_is_not_found() {
    let client = client().await;
    let gvk = gvk_from_api_version("v1", "ConfigMap");

    let err = client
        .get(&gvk, Some(&namespace()), "cluster-client-does-not-exist")
        .await
        .expect_err("object should not exist");
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore]
async fn test_create_apply_delete_round() {
    let client = client().await;
    let name = "cluster-client-it";
    let gvk = gvk_from_api_version("v1", "ConfigMap");

    // Leftovers from an aborted run
    if let Ok(existing) = client.get(&gvk, Some(&namespace()), name).await {
        let _ = client.delete(&existing).await;
    }

    let created = client.create(&config_map(name, "one")).await.expect("create");
    assert!(created.uid().is_some());

    let err = client.create(&config_map(name, "one")).await.expect_err("duplicate create");
    assert!(err.is_already_exists());

    let patched = client
        .patch(&created, &config_map(name, "two"), "cluster-client-it", true)
        .await
        .expect("apply");
    assert_eq!(patched.pointer("/data/key"), Some(&json!("two")));

    client.delete(&patched).await.expect("delete");
    let err = client.delete(&patched).await.expect_err("second delete");
    assert!(err.is_not_found());
}
