//! Manifest rendering and transformation errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while rendering or transforming manifests.
///
/// Any of these aborts the whole reconciliation pass; nothing from a failed
/// render reaches the cluster.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Neither the directory nor its `default/` fallback has a kustomization.yaml
    #[error("No kustomization.yaml found in {0} or its default/ directory")]
    MissingKustomization(PathBuf),

    /// Reading a manifest file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest file is not valid YAML
    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A document is not a usable Kubernetes object
    #[error("Invalid resource in {path}: {reason}")]
    InvalidResource { path: PathBuf, reason: String },

    /// A field mapping targets a path that is absent and may not be created
    #[error("Path {pointer} not found in {resource}")]
    PathNotFound { resource: String, pointer: String },

    /// A JSON pointer cannot be applied to the document shape
    #[error("Invalid pointer {pointer} for {resource}: {reason}")]
    InvalidPointer {
        resource: String,
        pointer: String,
        reason: String,
    },

    /// A Deployment lacks the structure the manifest context needs
    #[error("Invalid Deployment {name}: {reason}")]
    InvalidDeployment { name: String, reason: String },
}
