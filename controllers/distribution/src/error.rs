//! Controller-specific error types.
//!
//! Per-resource failures are collected into [`ControllerError::Apply`] so one
//! bad resource does not hide the others; everything else aborts the pass.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use manifests::ManifestError;
use thiserror::Error;

/// Errors that can occur in the distribution controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster client error outside of per-resource convergence
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Rendering or transforming manifests failed
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Some resources of a pass failed to converge
    #[error("{} of {total} resources failed to converge: {}", .errors.len(), join_errors(.errors))]
    Apply {
        errors: Vec<ResourceError>,
        total: usize,
    },

    /// The pass was cancelled before every resource was processed
    #[error("Reconciliation cancelled")]
    Cancelled,

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convergence failure for one resource, tagged with its kind and name.
#[derive(Debug, Error)]
#[error("failed to manage {kind}/{name}: {source}")]
pub struct ResourceError {
    pub kind: String,
    pub name: String,
    pub source: ClusterError,
}

impl ResourceError {
    pub fn new(kind: &str, name: &str, source: ClusterError) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            source,
        }
    }
}

fn join_errors(errors: &[ResourceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_lists_every_failure() {
        let err = ControllerError::Apply {
            errors: vec![
                ResourceError::new("Service", "demo-service", ClusterError::Api("boom".to_string())),
                ResourceError::new("Deployment", "demo", ClusterError::Api("nope".to_string())),
            ],
            total: 5,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 of 5 resources failed to converge"));
        assert!(msg.contains("Service/demo-service: API error: boom"));
        assert!(msg.contains("Deployment/demo: API error: nope"));
    }
}
