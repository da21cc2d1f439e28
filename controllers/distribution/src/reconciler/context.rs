//! Builds the Deployment overlay for a ServerDistribution: the server image,
//! ConfigMap hashes and container/pod overrides.

use crate::error::ControllerError;
use crate::reconciler::field_mappings::SERVICE_ACCOUNT_SUFFIX;
use cluster_client::{gvk_from_api_version, ClusterClientTrait};
use crds::ServerDistribution;
use kube::ResourceExt;
use manifests::ManifestContext;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Image table compiled into the binary: distribution name to image.
const EMBEDDED_DISTRIBUTIONS: &str = include_str!("../distributions.json");

pub const DATA_VOLUME: &str = "data";
pub const DEFAULT_DATA_MOUNT_PATH: &str = "/data";
pub const USER_CONFIG_VOLUME: &str = "user-config";
pub const USER_CONFIG_MOUNT_PATH: &str = "/etc/distro";
pub const CA_BUNDLE_VOLUME: &str = "ca-bundle";
pub const CA_BUNDLE_MOUNT_PATH: &str = "/etc/ssl/certs/distro";

/// Parses the embedded distribution image table.
pub fn load_distribution_images() -> Result<HashMap<String, String>, ControllerError> {
    serde_json::from_str(EMBEDDED_DISTRIBUTIONS)
        .map_err(|e| ControllerError::InvalidConfig(format!("invalid embedded distributions table: {e}")))
}

/// The explicit image if set, else the image registered for the named distribution.
pub fn resolve_image(dist: &ServerDistribution, images: &HashMap<String, String>) -> Result<String, ControllerError> {
    let distribution = &dist.spec.server.distribution;
    if let Some(image) = distribution.image.as_deref().filter(|i| !i.is_empty()) {
        return Ok(image.to_string());
    }
    match distribution.name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => images.get(name).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = images.keys().map(String::as_str).collect();
            known.sort_unstable();
            ControllerError::InvalidConfig(format!(
                "unknown distribution '{name}', expected one of: {}",
                known.join(", ")
            ))
        }),
        None => Err(ControllerError::InvalidConfig(
            "spec.server.distribution needs either name or image".to_string(),
        )),
    }
}

/// SHA-256 (hex) over the sorted `data` entries of a ConfigMap. With `keys`,
/// only those entries are hashed and each must be present.
pub async fn config_map_hash(
    client: &dyn ClusterClientTrait,
    namespace: &str,
    name: &str,
    keys: &[String],
) -> Result<String, ControllerError> {
    let gvk = gvk_from_api_version("v1", "ConfigMap");
    let config_map = client.get(&gvk, Some(namespace), name).await?;

    let data: BTreeMap<&str, &str> = config_map
        .pointer("/data")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
        .filter(|(k, _)| keys.is_empty() || keys.iter().any(|want| want.as_str() == *k))
        .collect();

    if let Some(missing) = keys.iter().find(|k| !data.contains_key(k.as_str())) {
        return Err(ControllerError::InvalidConfig(format!(
            "ConfigMap {namespace}/{name} has no key '{missing}'"
        )));
    }

    let mut hasher = Sha256::new();
    for (key, value) in &data {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Assembles the overlay for `dist`, reading referenced ConfigMaps.
pub async fn build_manifest_context(
    client: &dyn ClusterClientTrait,
    dist: &ServerDistribution,
    images: &HashMap<String, String>,
) -> Result<ManifestContext, ControllerError> {
    let name = dist.name_any();
    let namespace = dist.namespace().unwrap_or_default();
    let server = &dist.spec.server;

    let mut ctx = ManifestContext {
        resolved_image: resolve_image(dist, images)?,
        ..Default::default()
    };

    let mut volumes = vec![match &server.storage {
        Some(_) => json!({"name": DATA_VOLUME, "persistentVolumeClaim": {"claimName": format!("{name}-pvc")}}),
        None => json!({"name": DATA_VOLUME, "emptyDir": {}}),
    }];
    let mut mounts = vec![json!({
        "name": DATA_VOLUME,
        "mountPath": server
            .storage
            .as_ref()
            .and_then(|s| s.mount_path.as_deref())
            .unwrap_or(DEFAULT_DATA_MOUNT_PATH),
    })];

    if let Some(user_config) = &server.user_config {
        let cm_namespace = user_config.config_map_namespace.as_deref().unwrap_or(&namespace);
        ctx.config_hash = config_map_hash(client, cm_namespace, &user_config.config_map_name, &[]).await?;
        volumes.push(json!({"name": USER_CONFIG_VOLUME, "configMap": {"name": user_config.config_map_name}}));
        mounts.push(json!({"name": USER_CONFIG_VOLUME, "mountPath": USER_CONFIG_MOUNT_PATH, "readOnly": true}));
    }

    if let Some(ca) = server.tls_config.as_ref().and_then(|t| t.ca_bundle.as_ref()) {
        let cm_namespace = ca.config_map_namespace.as_deref().unwrap_or(&namespace);
        ctx.ca_bundle_hash = config_map_hash(client, cm_namespace, &ca.config_map_name, &ca.config_map_keys).await?;
        volumes.push(json!({"name": CA_BUNDLE_VOLUME, "configMap": {"name": ca.config_map_name}}));
        mounts.push(json!({"name": CA_BUNDLE_VOLUME, "mountPath": CA_BUNDLE_MOUNT_PATH, "readOnly": true}));
    }

    let mut service_account = format!("{name}-{SERVICE_ACCOUNT_SUFFIX}");
    if let Some(overrides) = &server.pod_overrides {
        volumes.extend(overrides.volumes.iter().cloned());
        mounts.extend(overrides.volume_mounts.iter().cloned());
        if let Some(sa) = overrides.service_account_name.as_deref().filter(|s| !s.is_empty()) {
            service_account = sa.to_string();
        }
    }

    let container = &server.container_spec;
    let mut container_overrides = Map::new();
    if let Some(container_name) = container.name.as_deref().filter(|n| !n.is_empty()) {
        container_overrides.insert("name".to_string(), json!(container_name));
    }
    if let Some(port) = dist.server_port() {
        container_overrides.insert("ports".to_string(), json!([{"name": "http", "containerPort": port}]));
    }
    if !container.env.is_empty() {
        container_overrides.insert("env".to_string(), serde_json::to_value(&container.env)?);
    }
    container_overrides.insert("volumeMounts".to_string(), Value::Array(mounts));
    ctx.container_overrides = container_overrides;

    let mut pod_overrides = Map::new();
    pod_overrides.insert("serviceAccountName".to_string(), json!(service_account));
    pod_overrides.insert("volumes".to_string(), Value::Array(volumes));
    ctx.pod_overrides = pod_overrides;

    Ok(ctx)
}
