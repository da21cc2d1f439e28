//! ServerDistribution CRD
//!
//! The owner object of every resource rendered by distro-operator. One
//! `ServerDistribution` expands into a Deployment, Service, PersistentVolumeClaim,
//! NetworkPolicy and the RBAC bindings its workload needs.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Storage size used when `spec.server.storage.size` is not set.
pub const DEFAULT_STORAGE_SIZE: &str = "10Gi";

/// Server port used when `spec.server.containerSpec.port` is not set.
pub const DEFAULT_SERVER_PORT: i32 = 8321;

/// Label carrying the owning instance name on every rendered resource.
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label identifying resources created by this operator.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`] written by this operator.
pub const MANAGED_BY_VALUE: &str = "distro-operator";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "distro.microscaler.io",
    version = "v1alpha1",
    kind = "ServerDistribution",
    namespaced,
    status = "ServerDistributionStatus",
    shortname = "sdist",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServerDistributionSpec {
    /// Number of server replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Server configuration
    #[serde(default)]
    pub server: ServerSpec,
}

fn default_replicas() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Which distribution image to run
    #[serde(default)]
    pub distribution: DistributionType,

    /// Container-level settings
    #[serde(default)]
    pub container_spec: ContainerSpec,

    /// Persistent storage for the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// User supplied server configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_config: Option<UserConfigSpec>,

    /// TLS settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfigSpec>,

    /// Pod-level overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_overrides: Option<PodOverrides>,
}

/// Either a named distribution (resolved through the operator's image table)
/// or an explicit image. `image` wins when both are set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Container name (defaults to the name in the manifest)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Port the server listens on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Extra environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Requested volume size, e.g. "20Gi"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Where the volume is mounted in the server container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserConfigSpec {
    /// ConfigMap holding the server configuration
    pub config_map_name: String,

    /// Namespace of the ConfigMap (defaults to the ServerDistribution namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<CaBundleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaBundleConfig {
    /// ConfigMap holding the CA bundle
    pub config_map_name: String,

    /// Namespace of the ConfigMap (defaults to the ServerDistribution namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_namespace: Option<String>,

    /// Keys to read from the ConfigMap (all keys when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_map_keys: Vec<String>,
}

/// Free-form pod overrides. Volumes and mounts are passed through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "preserved_object_list")]
    pub volumes: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "preserved_object_list")]
    pub volume_mounts: Vec<serde_json::Value>,
}

fn preserved_object_list(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerDistributionStatus {
    /// Overall state of the last reconciliation pass
    #[serde(default)]
    pub phase: DistributionPhase,

    /// Human readable detail, set when the pass failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation observed by the last pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Time of the last phase change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Serializes as PascalCase ("Ready", "Failed", ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum DistributionPhase {
    #[default]
    Pending,
    Ready,
    Failed,
}

impl DistributionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DistributionPhase::Pending => "Pending",
            DistributionPhase::Ready => "Ready",
            DistributionPhase::Failed => "Failed",
        }
    }
}

impl ServerDistribution {
    /// Storage size requested in the spec, if any.
    pub fn storage_size(&self) -> Option<&str> {
        self.spec
            .server
            .storage
            .as_ref()
            .and_then(|s| s.size.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Server port requested in the spec; zero counts as unset.
    pub fn server_port(&self) -> Option<i32> {
        self.spec.server.container_spec.port.filter(|p| *p != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec: ServerDistributionSpec = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(spec.replicas, 1);
        assert!(spec.server.storage.is_none());
        assert!(spec.server.container_spec.port.is_none());
    }

    #[test]
    fn test_phase_serializes_pascal_case() {
        let status = ServerDistributionStatus {
            phase: DistributionPhase::Ready,
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["phase"], "Ready");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_zero_port_is_unset() {
        let mut dist = ServerDistribution::new("demo", ServerDistributionSpec::default());
        dist.spec.server.container_spec.port = Some(0);
        assert_eq!(dist.server_port(), None);
        dist.spec.server.container_spec.port = Some(9000);
        assert_eq!(dist.server_port(), Some(9000));
    }

    #[test]
    fn test_empty_storage_size_is_unset() {
        let mut dist = ServerDistribution::new("demo", ServerDistributionSpec::default());
        dist.spec.server.storage = Some(StorageSpec {
            size: Some(String::new()),
            mount_path: None,
        });
        assert_eq!(dist.storage_size(), None);
    }
}
