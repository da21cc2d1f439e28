//! Transform pipeline
//!
//! Runs name prefixing, then namespace stamping, then the field mapping
//! engine over a rendered resource set. Prefixing and stamping come first so
//! that values written by mappings are never renamed afterwards.

use crate::error::ManifestError;
use crate::field_mapping::{apply_mappings, FieldMapping};
use cluster_client::Manifest;
use tracing::debug;

/// Kinds that never carry a namespace.
///
/// Rendering happens before any cluster I/O, so namespace stamping cannot ask
/// the API server. The reconciler still resolves scope through discovery
/// before deciding on owner references.
pub const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "ClusterRole",
    "ClusterRoleBinding",
    "CSIDriver",
    "CSINode",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "RuntimeClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
];

/// Kinds excluded from name prefixing unless configured otherwise.
pub const DEFAULT_PREFIX_EXCLUDED_KINDS: &[&str] = &["Deployment"];

/// Whether a kind is in the well-known cluster-scoped set.
pub fn is_cluster_scoped_kind(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Inputs of the transform pipeline, derived from the owner object.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Prepended as `<prefix>-<name>`; no prefixing when empty
    pub name_prefix: String,
    /// Kinds that keep their rendered name
    pub prefix_excluded_kinds: Vec<String>,
    /// Namespace stamped on namespace-scoped resources; skipped when empty
    pub namespace: String,
    /// Field mappings, applied in order
    pub mappings: Vec<FieldMapping>,
}

impl TransformOptions {
    /// Options for an owner called `name` in `namespace`, excluding the
    /// default kinds from prefixing.
    pub fn for_owner(name: &str, namespace: &str, mappings: Vec<FieldMapping>) -> Self {
        Self {
            name_prefix: name.to_string(),
            prefix_excluded_kinds: DEFAULT_PREFIX_EXCLUDED_KINDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            namespace: namespace.to_string(),
            mappings,
        }
    }
}

/// Prefixes every resource name with `prefix`, except for `excluded_kinds`.
pub fn apply_name_prefix(resources: &mut [Manifest], prefix: &str, excluded_kinds: &[String]) {
    if prefix.is_empty() {
        return;
    }
    for resource in resources
        .iter_mut()
        .filter(|r| !excluded_kinds.iter().any(|k| k == r.kind()))
    {
        let name = format!("{prefix}-{}", resource.name());
        resource.set_name(&name);
    }
}

/// Stamps `namespace` on every resource whose kind is not cluster-scoped.
pub fn apply_namespace(resources: &mut [Manifest], namespace: &str) {
    if namespace.is_empty() {
        return;
    }
    for resource in resources
        .iter_mut()
        .filter(|r| !is_cluster_scoped_kind(r.kind()))
    {
        resource.set_namespace(namespace);
    }
}

/// Runs the full pipeline. The input set is consumed, so a failure never
/// leaves a partially transformed set behind.
pub fn apply_transforms(mut resources: Vec<Manifest>, options: &TransformOptions) -> Result<Vec<Manifest>, ManifestError> {
    apply_name_prefix(&mut resources, &options.name_prefix, &options.prefix_excluded_kinds);
    apply_namespace(&mut resources, &options.namespace);
    apply_mappings(&mut resources, &options.mappings)?;
    debug!("Transformed {} resources", resources.len());
    Ok(resources)
}

/// Drops every resource whose kind is listed in `kinds`, keeping order.
pub fn filter_exclude_kinds(resources: Vec<Manifest>, kinds: &[&str]) -> Vec<Manifest> {
    resources
        .into_iter()
        .filter(|r| !kinds.contains(&r.kind()))
        .collect()
}
