//! One-time cleanup of ClusterRoleBindings left behind by earlier operator
//! releases.
//!
//! Those releases bound each instance's ServiceAccount through a binding
//! labeled `app.kubernetes.io/managed-by=distro-operator`. Current templates
//! no longer carry that label, so anything still wearing it is stale.

use cluster_client::{gvk_from_api_version, ClusterClientTrait, Manifest};
use crds::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use tracing::{debug, error, info, warn};

/// What happened to one legacy binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    /// Deleted by someone else between list and delete
    AlreadyGone,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRecord {
    pub name: String,
    pub outcome: CleanupOutcome,
}

/// Whether `binding` was written by an earlier release: it carries the
/// managed-by label and binds at least one namespaced ServiceAccount.
pub fn should_delete_legacy_binding(binding: &ClusterRoleBinding) -> bool {
    let managed = binding
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(MANAGED_BY_LABEL))
        .is_some_and(|v| v == MANAGED_BY_VALUE);
    if !managed {
        return false;
    }
    binding.subjects.iter().flatten().any(|subject| {
        subject.kind == "ServiceAccount" && subject.namespace.as_deref().is_some_and(|ns| !ns.is_empty())
    })
}

/// Deletes every legacy binding. Never fails: problems are logged and
/// reported per binding, and a failed list yields an empty report.
pub async fn cleanup_legacy(client: &dyn ClusterClientTrait) -> Vec<CleanupRecord> {
    let gvk = gvk_from_api_version("rbac.authorization.k8s.io/v1", "ClusterRoleBinding");
    let bindings = match client.list(&gvk).await {
        Ok(bindings) => bindings,
        Err(e) => {
            error!("Failed to list ClusterRoleBindings for legacy cleanup: {}", e);
            return Vec::new();
        }
    };

    let mut report = Vec::new();
    for resource in bindings.iter().filter(|r| is_legacy(r)) {
        let name = resource.name().to_string();
        let outcome = match client.delete(resource).await {
            Ok(()) => {
                info!("Deleted legacy ClusterRoleBinding {}", name);
                CleanupOutcome::Deleted
            }
            Err(e) if e.is_not_found() => {
                debug!("Legacy ClusterRoleBinding {} already gone", name);
                CleanupOutcome::AlreadyGone
            }
            Err(e) => {
                warn!("Failed to delete legacy ClusterRoleBinding {}: {}", name, e);
                CleanupOutcome::Failed(e.to_string())
            }
        };
        report.push(CleanupRecord { name, outcome });
    }

    if report.is_empty() {
        debug!("No legacy ClusterRoleBindings found");
    }
    report
}

fn is_legacy(resource: &Manifest) -> bool {
    match serde_json::from_value::<ClusterRoleBinding>(resource.as_value().clone()) {
        Ok(binding) => should_delete_legacy_binding(&binding),
        Err(e) => {
            warn!("Skipping unreadable ClusterRoleBinding {}: {}", resource.name(), e);
            false
        }
    }
}
