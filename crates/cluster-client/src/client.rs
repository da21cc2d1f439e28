//! Kubernetes API client
//!
//! Implements `ClusterClientTrait` over kube-rs `DynamicObject`s. Kinds are
//! resolved through API discovery once and cached, so scope lookups and
//! `Api` construction do not hit the discovery endpoints on every call.

use crate::error::ClusterError;
use crate::models::{Manifest, ObjectKey};
use crate::cluster_trait::ClusterClientTrait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::discovery::{self, Scope};
use kube::Client;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Dynamic Kubernetes API client
pub struct KubeClusterClient {
    client: Client,
    resources: RwLock<HashMap<String, (ApiResource, bool)>>,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wraps an existing kube client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a client from the in-cluster or kubeconfig environment.
    pub async fn try_default() -> Result<Self, ClusterError> {
        Ok(Self::new(Client::try_default().await?))
    }

    /// Resolves a GVK to its `ApiResource` and whether it is cluster-scoped.
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, bool), ClusterError> {
        let cache_key = format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind);
        let cached = self
            .resources
            .read()
            .ok()
            .and_then(|cache| cache.get(&cache_key).cloned());
        if let Some(hit) = cached {
            return Ok(hit);
        }

        debug!("Resolving {} through API discovery", cache_key);
        let (ar, caps) = discovery::pinned_kind(&self.client, gvk)
            .await
            .map_err(|e| ClusterError::Discovery(format!("{cache_key}: {e}")))?;
        let cluster_scoped = matches!(caps.scope, Scope::Cluster);

        if let Ok(mut cache) = self.resources.write() {
            cache.insert(cache_key, (ar.clone(), cluster_scoped));
        }
        Ok((ar, cluster_scoped))
    }

    async fn api(&self, gvk: &GroupVersionKind, namespace: Option<&str>) -> Result<Api<DynamicObject>, ClusterError> {
        let (ar, cluster_scoped) = self.resolve(gvk).await?;
        let api = if cluster_scoped {
            Api::all_with(self.client.clone(), &ar)
        } else {
            match namespace {
                Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
                None => Api::default_namespaced_with(self.client.clone(), &ar),
            }
        };
        Ok(api)
    }
}

fn to_dynamic(resource: &Manifest) -> Result<DynamicObject, ClusterError> {
    Ok(serde_json::from_value(resource.as_value().clone())?)
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> Result<Manifest, ClusterError> {
        let key = ObjectKey::new(gvk, namespace, name);
        let api = self.api(gvk, namespace).await?;
        let obj = api
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, key.to_string()))?;
        Manifest::from_object(&obj)
    }

    async fn create(&self, resource: &Manifest) -> Result<Manifest, ClusterError> {
        let api = self.api(&resource.gvk(), resource.namespace()).await?;
        let created = api
            .create(&PostParams::default(), &to_dynamic(resource)?)
            .await
            .map_err(|e| ClusterError::from_kube_create(e, resource.key().to_string()))?;
        Manifest::from_object(&created)
    }

    async fn patch(&self, existing: &Manifest, desired: &Manifest, field_owner: &str, force: bool) -> Result<Manifest, ClusterError> {
        let api = self.api(&existing.gvk(), existing.namespace()).await?;
        let mut params = PatchParams::apply(field_owner);
        if force {
            params = params.force();
        }
        let patched = api
            .patch(existing.name(), &params, &Patch::Apply(desired.as_value()))
            .await
            .map_err(|e| ClusterError::from_kube(e, existing.key().to_string()))?;
        Manifest::from_object(&patched)
    }

    async fn delete(&self, resource: &Manifest) -> Result<(), ClusterError> {
        let api = self.api(&resource.gvk(), resource.namespace()).await?;
        api.delete(resource.name(), &DeleteParams::default())
            .await
            .map_err(|e| ClusterError::from_kube(e, resource.key().to_string()))?;
        Ok(())
    }

    async fn list(&self, gvk: &GroupVersionKind) -> Result<Vec<Manifest>, ClusterError> {
        let (ar, _) = self.resolve(gvk).await?;
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        let list = api.list(&ListParams::default()).await?;
        list.items
            .iter()
            .map(|obj| {
                // List items omit apiVersion/kind; restore them from the resource.
                let mut value = serde_json::to_value(obj)?;
                if let Some(map) = value.as_object_mut() {
                    map.insert("apiVersion".to_string(), ar.api_version.clone().into());
                    map.insert("kind".to_string(), ar.kind.clone().into());
                }
                Manifest::from_value(value)
            })
            .collect()
    }

    async fn is_cluster_scoped(&self, gvk: &GroupVersionKind) -> Result<bool, ClusterError> {
        let (_, cluster_scoped) = self.resolve(gvk).await?;
        Ok(cluster_scoped)
    }

    async fn patch_status(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str, status: &serde_json::Value) -> Result<(), ClusterError> {
        let key = ObjectKey::new(gvk, namespace, name);
        let api = self.api(gvk, namespace).await?;
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| ClusterError::from_kube(e, key.to_string()))?;
        Ok(())
    }
}
