//! ClusterClient trait for mocking
//!
//! This trait abstracts the Kubernetes API so the reconciler can be unit tested.
//! The concrete `KubeClusterClient` implements it over kube-rs dynamic objects,
//! and tests use `MockClusterClient` from the `test-util` feature.

use crate::error::ClusterError;
use crate::models::Manifest;
use kube::core::GroupVersionKind;

/// Trait for the Kubernetes API operations the reconciler needs.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
/// Missing objects are reported as [`ClusterError::NotFound`] and create
/// conflicts as [`ClusterError::AlreadyExists`].
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Point lookup. `namespace` is ignored for cluster-scoped kinds.
    async fn get(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> Result<Manifest, ClusterError>;

    /// Creates the object exactly as given.
    async fn create(&self, resource: &Manifest) -> Result<Manifest, ClusterError>;

    /// Server-side apply of `desired` onto `existing` as `field_owner`.
    /// With `force`, conflicting field ownership is taken over.
    async fn patch(&self, existing: &Manifest, desired: &Manifest, field_owner: &str, force: bool) -> Result<Manifest, ClusterError>;

    /// Deletes the object.
    async fn delete(&self, resource: &Manifest) -> Result<(), ClusterError>;

    /// Lists every object of a kind across all namespaces.
    async fn list(&self, gvk: &GroupVersionKind) -> Result<Vec<Manifest>, ClusterError>;

    /// Whether the kind is cluster-scoped, from the API server's discovery data.
    async fn is_cluster_scoped(&self, gvk: &GroupVersionKind) -> Result<bool, ClusterError>;

    /// Merge-patches the status subresource.
    async fn patch_status(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str, status: &serde_json::Value) -> Result<(), ClusterError>;
}
