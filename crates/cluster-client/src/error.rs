//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes API error not covered by the variants below
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// API request rejected for a reason other than the ones below
    #[error("API error: {0}")]
    Api(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists (create conflict)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document is not a usable Kubernetes object
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// The API server does not serve the requested kind
    #[error("Discovery error: {0}")]
    Discovery(String),
}

impl ClusterError {
    /// Returns true for [`ClusterError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    /// Returns true for [`ClusterError::AlreadyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists(_))
    }

    /// Maps a raw kube error onto [`ClusterError::NotFound`] using the HTTP
    /// status carried by the API response.
    pub fn from_kube(err: kube::Error, what: impl Into<String>) -> Self {
        match api_status_code(&err) {
            Some(404) => ClusterError::NotFound(what.into()),
            _ => ClusterError::Kube(err),
        }
    }

    /// Like [`ClusterError::from_kube`], additionally mapping a create conflict
    /// onto [`ClusterError::AlreadyExists`].
    pub fn from_kube_create(err: kube::Error, what: impl Into<String>) -> Self {
        match api_status_code(&err) {
            Some(409) => ClusterError::AlreadyExists(what.into()),
            _ => ClusterError::from_kube(err, what),
        }
    }
}

fn api_status_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(resp) => Some(resp.code),
        _ => None,
    }
}
