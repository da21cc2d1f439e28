//! Reconciliation logic for ServerDistribution resources.
//!
//! One pass renders the manifest directory for an owner, transforms it, and
//! converges every resource in render order:
//! - `context`: image resolution, ConfigMap hashes, Deployment overlay
//! - `field_mappings`: owner spec values copied into rendered resources
//! - `converge`: create / patch / skip decision for one resource
//! - `ownership`, `dependency`, `service`: the guards `converge` consults

pub mod context;
pub mod converge;
pub mod dependency;
pub mod field_mappings;
pub mod ownership;
pub mod service;

use crate::backoff::BackoffTracker;
use crate::config::Config;
use crate::error::ControllerError;
use crate::probes::Metrics;
use crate::reconcile_helpers::{next_status, status_needs_update};
use cluster_client::{gvk_from_api_version, ClusterClientTrait, Manifest};
use context::{build_manifest_context, load_distribution_images};
use converge::ConvergeOutcome;
use crds::{DistributionPhase, ServerDistribution};
use field_mappings::build_field_mappings;
use kube::{Resource, ResourceExt};
use manifests::{filter_exclude_kinds, render_manifest_with_context, TransformOptions};
use ownership::Owner;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of each resource of a pass, as `Kind/name`.
pub type ConvergeReport = Vec<(String, ConvergeOutcome)>;

/// Reconciles ServerDistribution resources.
pub struct Reconciler {
    pub(crate) client: Box<dyn ClusterClientTrait>,
    pub(crate) config: Config,
    images: HashMap<String, String>,
    pub(crate) metrics: Arc<Metrics>,
    /// Error count tracking per owner (namespace/name)
    pub(crate) backoff: BackoffTracker,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("distributions", &self.images.len())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Box<dyn ClusterClientTrait>,
        config: Config,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ControllerError> {
        Ok(Self {
            client,
            config,
            images: load_distribution_images()?,
            metrics,
            backoff: BackoffTracker::default(),
        })
    }

    /// Runs one pass for `dist` and records its status.
    ///
    /// The status is left alone when the pass was cancelled.
    pub async fn reconcile_distribution(
        &self,
        dist: &ServerDistribution,
        cancel: &CancellationToken,
    ) -> Result<ConvergeReport, ControllerError> {
        let key = format!("{}/{}", dist.namespace().unwrap_or_default(), dist.name_any());
        info!("Reconciling ServerDistribution {}", key);

        let result = self.converge_all(dist, cancel).await;
        match &result {
            Ok(report) => {
                info!("ServerDistribution {} converged ({} resources)", key, report.len());
                self.update_status(dist, DistributionPhase::Ready, None).await;
            }
            Err(ControllerError::Cancelled) => {
                info!("Reconciliation of {} cancelled", key);
            }
            Err(e) => {
                error!("Reconciliation of {} failed: {}", key, e);
                self.metrics.record_error();
                self.update_status(dist, DistributionPhase::Failed, Some(e.to_string())).await;
            }
        }
        result
    }

    async fn converge_all(
        &self,
        dist: &ServerDistribution,
        cancel: &CancellationToken,
    ) -> Result<ConvergeReport, ControllerError> {
        let owner = Owner::from_distribution(dist)?;
        let resources = self.desired_resources(dist, &owner).await?;
        let total = resources.len();

        let mut report = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for resource in &resources {
            if cancel.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }
            match self.converge(resource, &owner).await {
                Ok(outcome) => {
                    self.metrics.record_outcome(outcome.as_str());
                    report.push((resource.to_string(), outcome));
                }
                Err(e) => {
                    error!("{}", e);
                    self.metrics.record_outcome("error");
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(ControllerError::Apply { errors, total })
        }
    }

    /// Renders and transforms the resource set for `dist`, dropping the kinds
    /// its configuration leaves out.
    pub(crate) async fn desired_resources(
        &self,
        dist: &ServerDistribution,
        owner: &Owner,
    ) -> Result<Vec<Manifest>, ControllerError> {
        let context = build_manifest_context(self.client.as_ref(), dist, &self.images).await?;
        let options = TransformOptions::for_owner(
            &owner.name,
            &owner.namespace,
            build_field_mappings(dist, &self.config.operator_namespace),
        );
        let rendered = render_manifest_with_context(&self.config.manifests_path, &options, Some(&context))?;

        let mut excluded = Vec::new();
        if !self.config.enable_network_policy {
            excluded.push("NetworkPolicy");
        }
        if dist.spec.server.storage.is_none() {
            excluded.push("PersistentVolumeClaim");
        }
        let resources = filter_exclude_kinds(rendered, &excluded);
        debug!("{} desired resources for {}/{}", resources.len(), owner.namespace, owner.name);
        Ok(resources)
    }

    /// Patches the owner's status unless it already says the same thing.
    /// Failures are logged; the pass result stands.
    async fn update_status(&self, dist: &ServerDistribution, phase: DistributionPhase, message: Option<String>) {
        let current = dist.status.as_ref();
        let generation = dist.metadata.generation;
        if !status_needs_update(current, phase, message.as_deref(), generation) {
            debug!("Status of {} already {}, skipping update", dist.name_any(), phase.as_str());
            return;
        }

        let status = next_status(current, phase, message, generation, chrono::Utc::now());
        let value = match serde_json::to_value(&status) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize status for {}: {}", dist.name_any(), e);
                return;
            }
        };
        let gvk = gvk_from_api_version(&ServerDistribution::api_version(&()), &ServerDistribution::kind(&()));
        let namespace = dist.namespace();
        match self
            .client
            .patch_status(&gvk, namespace.as_deref(), &dist.name_any(), &value)
            .await
        {
            Ok(()) => info!("Updated status of {} to {}", dist.name_any(), phase.as_str()),
            Err(e) => warn!("Failed to update status of {}: {}", dist.name_any(), e),
        }
    }
}
