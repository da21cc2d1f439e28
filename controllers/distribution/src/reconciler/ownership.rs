//! Owner identity and the ownership guard.

use crate::error::ControllerError;
use cluster_client::Manifest;
use crds::ServerDistribution;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

/// The identity of the owner object for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Owner {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub api_group: String,
    pub kind: String,
    /// Controller reference attached to namespace-scoped resources on create
    pub owner_ref: OwnerReference,
}

impl Owner {
    pub fn from_distribution(dist: &ServerDistribution) -> Result<Self, ControllerError> {
        let name = dist.name_any();
        let namespace = dist.namespace().ok_or_else(|| {
            ControllerError::InvalidConfig(format!("ServerDistribution {name} has no namespace"))
        })?;
        let uid = dist
            .uid()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("ServerDistribution {name} has no uid")))?;
        let owner_ref = dist.controller_owner_ref(&()).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("cannot build owner reference for {name}"))
        })?;
        Ok(Self {
            name,
            namespace,
            uid,
            api_group: ServerDistribution::group(&()).to_string(),
            kind: ServerDistribution::kind(&()).to_string(),
            owner_ref,
        })
    }

    /// Whether `resource` denotes this owner object itself.
    pub fn is_self(&self, resource: &Manifest) -> bool {
        let gvk = resource.gvk();
        gvk.group == self.api_group
            && gvk.kind == self.kind
            && resource.name() == self.name
            && resource.namespace() == Some(self.namespace.as_str())
    }
}

/// True iff one of the live resource's owner references carries the owner's uid.
pub fn is_owned_by_instance(live: &Manifest, owner: &Owner) -> bool {
    !owner.uid.is_empty() && live.owner_uids().any(|uid| uid == owner.uid)
}
