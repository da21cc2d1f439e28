//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::config::Config;
use crate::probes::Metrics;
use crate::reconciler::Reconciler;
use cluster_client::{Manifest, MockClusterClient};
use crds::{DistributionType, ServerDistribution, ServerDistributionSpec, ServerSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Helper to create a test ServerDistribution running the `starter` distribution
pub fn create_test_distribution(name: &str, namespace: &str, uid: &str) -> ServerDistribution {
    ServerDistribution {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        spec: ServerDistributionSpec {
            replicas: 1,
            server: ServerSpec {
                distribution: DistributionType {
                    name: Some("starter".to_string()),
                    image: None,
                },
                ..Default::default()
            },
        },
        status: None,
    }
}

/// Wraps a JSON document as a manifest, panicking on invalid input
pub fn manifest(doc: serde_json::Value) -> Manifest {
    Manifest::from_value(doc).unwrap()
}

/// The manifest directory shipped with the operator
pub fn manifests_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../manifests")
}

pub fn test_config(manifests_path: &Path) -> Config {
    Config {
        manifests_path: manifests_path.to_path_buf(),
        watch_namespace: None,
        operator_namespace: "distro-operator-system".to_string(),
        enable_network_policy: true,
        probe_addr: "127.0.0.1:0".parse().unwrap(),
    }
}

/// Helper to create a reconciler over the shipped manifests and a mock cluster
pub fn create_test_reconciler(mock: &MockClusterClient) -> Reconciler {
    create_test_reconciler_with_config(mock, test_config(&manifests_dir()))
}

pub fn create_test_reconciler_with_config(mock: &MockClusterClient, config: Config) -> Reconciler {
    Reconciler::new(Box::new(mock.clone()), config, Arc::new(Metrics::new().unwrap())).unwrap()
}

/// Stores `dist` in the mock so status patches have a target
pub fn store_distribution(mock: &MockClusterClient, dist: &ServerDistribution) {
    mock.add_object(Manifest::from_object(dist).unwrap());
}

/// Reads `dist` back from the mock, including any status written to it
pub fn reload_distribution(mock: &MockClusterClient, dist: &ServerDistribution) -> ServerDistribution {
    let name = dist.metadata.name.as_deref().unwrap();
    let stored = mock
        .find("ServerDistribution", dist.metadata.namespace.as_deref(), name)
        .unwrap();
    serde_json::from_value(stored.into_value()).unwrap()
}
