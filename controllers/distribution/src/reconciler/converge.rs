//! Per-resource convergence.
//!
//! Decides for one desired resource whether to create it, patch it, or leave
//! it alone, and performs that write.

use crate::error::ResourceError;
use crate::reconciler::dependency::check_dependency_exists;
use crate::reconciler::ownership::{is_owned_by_instance, Owner};
use crate::reconciler::service::check_and_log_service_changes;
use crate::reconciler::Reconciler;
use cluster_client::{ClusterError, Manifest};
use tracing::{debug, info};

/// What `converge` did with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeOutcome {
    Created,
    /// Create raced with another writer; the object is left as found
    AlreadyExists,
    Patched,
    SkippedSelf,
    SkippedMissingDependency,
    SkippedUnowned,
    SkippedImmutable,
}

impl ConvergeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvergeOutcome::Created => "created",
            ConvergeOutcome::AlreadyExists => "already_exists",
            ConvergeOutcome::Patched => "patched",
            ConvergeOutcome::SkippedSelf => "skipped_self",
            ConvergeOutcome::SkippedMissingDependency => "skipped_missing_dependency",
            ConvergeOutcome::SkippedUnowned => "skipped_unowned",
            ConvergeOutcome::SkippedImmutable => "skipped_immutable",
        }
    }
}

/// Kinds that are never patched once created.
const IMMUTABLE_KINDS: &[&str] = &["PersistentVolumeClaim"];

impl Reconciler {
    /// Converges one desired resource against the cluster.
    pub async fn converge(&self, desired: &Manifest, owner: &Owner) -> Result<ConvergeOutcome, ResourceError> {
        let wrap = |e: ClusterError| ResourceError::new(desired.kind(), desired.name(), e);

        if owner.is_self(desired) {
            debug!("Skipping {}: it is the owner object itself", desired);
            return Ok(ConvergeOutcome::SkippedSelf);
        }

        if check_dependency_exists(self.client.as_ref(), desired).await.map_err(wrap)? {
            info!("Skipping {}: referenced role not found", desired);
            return Ok(ConvergeOutcome::SkippedMissingDependency);
        }

        let gvk = desired.gvk();
        match self.client.get(&gvk, desired.namespace(), desired.name()).await {
            Ok(live) => self.patch_resource(desired, &live, owner).await.map_err(wrap),
            Err(e) if e.is_not_found() => self.create_resource(desired, owner).await.map_err(wrap),
            Err(e) => Err(wrap(e)),
        }
    }

    /// Creates `desired`. Namespace-scoped resources get a controller
    /// reference to the owner; cluster-scoped ones cannot carry one.
    async fn create_resource(
        &self,
        desired: &Manifest,
        owner: &Owner,
    ) -> Result<ConvergeOutcome, ClusterError> {
        let mut resource = desired.clone();
        if self.client.is_cluster_scoped(&desired.gvk()).await? {
            resource.clear_namespace();
        } else {
            resource.set_controller_reference(owner.owner_ref.clone())?;
        }

        match self.client.create(&resource).await {
            Ok(_) => {
                info!("Created {}", resource);
                Ok(ConvergeOutcome::Created)
            }
            Err(e) if e.is_already_exists() => {
                debug!("{} was created concurrently, leaving it for the next pass", resource);
                Ok(ConvergeOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    /// Patches `live` towards `desired`, but only when this owner owns it.
    async fn patch_resource(
        &self,
        desired: &Manifest,
        live: &Manifest,
        owner: &Owner,
    ) -> Result<ConvergeOutcome, ClusterError> {
        if !is_owned_by_instance(live, owner) {
            info!("Skipping {}: not owned by {}/{}", live, owner.namespace, owner.name);
            return Ok(ConvergeOutcome::SkippedUnowned);
        }

        if IMMUTABLE_KINDS.contains(&live.kind()) {
            info!("Skipping {}: immutable after creation", live);
            return Ok(ConvergeOutcome::SkippedImmutable);
        }

        if live.kind() == "Service" {
            check_and_log_service_changes(live, desired);
        }

        self.client.patch(live, desired, &owner.name, true).await?;
        debug!("Applied {}", desired);
        Ok(ConvergeOutcome::Patched)
    }
}
