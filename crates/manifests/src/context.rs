//! Deployment overlay
//!
//! `ManifestContext` carries the values that cannot be expressed as simple
//! field mappings: the resolved server image, container and pod overrides,
//! and hashes of referenced ConfigMaps. Hash annotations on the pod template
//! force a rollout when referenced configuration changes without any spec
//! field changing.

use crate::error::ManifestError;
use cluster_client::Manifest;
use serde_json::{Map, Value};

/// Pod template annotation holding the hash of the user config ConfigMap.
pub const USER_CONFIG_HASH_ANNOTATION: &str = "configmap.hash/user-config";

/// Pod template annotation holding the hash of the CA bundle ConfigMap.
pub const CA_BUNDLE_HASH_ANNOTATION: &str = "configmap.hash/ca-bundle";

/// Overlay applied to every rendered Deployment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestContext {
    /// Image for the first container; left as rendered when empty
    pub resolved_image: String,
    /// Hash of the user config ConfigMap; no annotation when empty
    pub config_hash: String,
    /// Hash of the CA bundle ConfigMap; no annotation when empty
    pub ca_bundle_hash: String,
    /// Merged key by key into the first container
    pub container_overrides: Map<String, Value>,
    /// Merged key by key into the pod template spec
    pub pod_overrides: Map<String, Value>,
}

impl ManifestContext {
    fn touches_container(&self) -> bool {
        !self.resolved_image.is_empty() || !self.container_overrides.is_empty()
    }

    /// Applies the overlay to one Deployment.
    ///
    /// Each override key replaces the rendered value wholesale, lists
    /// included.
    pub fn apply_to_deployment(&self, deployment: &mut Manifest) -> Result<(), ManifestError> {
        let name = deployment.name().to_string();
        let invalid = |reason: &str| ManifestError::InvalidDeployment {
            name: name.clone(),
            reason: reason.to_string(),
        };

        let template = deployment
            .value_mut()
            .pointer_mut("/spec/template")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| invalid("missing spec.template"))?;

        let pod_spec = template
            .get_mut("spec")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| invalid("missing spec.template.spec"))?;

        if self.touches_container() {
            let container = pod_spec
                .get_mut("containers")
                .and_then(Value::as_array_mut)
                .and_then(|containers| containers.first_mut())
                .and_then(Value::as_object_mut)
                .ok_or_else(|| invalid("pod template has no containers"))?;
            if !self.resolved_image.is_empty() {
                container.insert("image".to_string(), Value::String(self.resolved_image.clone()));
            }
            merge_overrides(container, &self.container_overrides);
        }
        merge_overrides(pod_spec, &self.pod_overrides);

        let hashes = [
            (USER_CONFIG_HASH_ANNOTATION, &self.config_hash),
            (CA_BUNDLE_HASH_ANNOTATION, &self.ca_bundle_hash),
        ];
        if hashes.iter().all(|(_, hash)| hash.is_empty()) {
            return Ok(());
        }
        let annotations = child_map(template, "metadata")
            .and_then(|meta| child_map(meta, "annotations"))
            .ok_or_else(|| invalid("cannot create pod template annotations"))?;
        for (key, hash) in hashes {
            if !hash.is_empty() {
                annotations.insert(key.to_string(), Value::String(hash.clone()));
            }
        }
        Ok(())
    }

    /// Applies the overlay to every Deployment in the set.
    pub fn apply(&self, resources: &mut [Manifest]) -> Result<(), ManifestError> {
        resources
            .iter_mut()
            .filter(|r| r.kind() == "Deployment")
            .try_for_each(|d| self.apply_to_deployment(d))
    }
}

/// Returns the map under `key`, replacing a missing or non-map value.
fn child_map<'a>(parent: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    let entry = parent.entry(key.to_string()).or_insert(Value::Null);
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

fn merge_overrides(target: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> Manifest {
        Manifest::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "server"},
            "spec": {
                "template": {
                    "spec": {
                        "containers": [{
                            "name": "server",
                            "image": "placeholder",
                            "env": [{"name": "LOG_LEVEL", "value": "info"}]
                        }],
                        "volumes": [{"name": "data", "emptyDir": {}}]
                    }
                }
            }
        }))
        .unwrap()
    }

    fn as_map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected a map"),
        }
    }

    #[test]
    fn test_hash_annotations_are_created() {
        let ctx = ManifestContext {
            config_hash: "abc".to_string(),
            ..Default::default()
        };
        let mut d = deployment();
        ctx.apply_to_deployment(&mut d).unwrap();
        assert_eq!(
            d.pointer("/spec/template/metadata/annotations/configmap.hash~1user-config"),
            Some(&json!("abc"))
        );
        assert!(d
            .pointer("/spec/template/metadata/annotations/configmap.hash~1ca-bundle")
            .is_none());
    }

    #[test]
    fn test_empty_context_changes_nothing() {
        let mut d = deployment();
        ManifestContext::default().apply_to_deployment(&mut d).unwrap();
        assert_eq!(d, deployment());
    }

    #[test]
    fn test_image_and_container_overrides() {
        let ctx = ManifestContext {
            resolved_image: "docker.io/distro/server:1.0".to_string(),
            container_overrides: as_map(json!({
                "env": [
                    {"name": "LOG_LEVEL", "value": "debug"},
                    {"name": "EXTRA", "value": "1"}
                ]
            })),
            ..Default::default()
        };
        let mut d = deployment();
        ctx.apply_to_deployment(&mut d).unwrap();
        let container = d.pointer("/spec/template/spec/containers/0").unwrap();
        assert_eq!(container["image"], "docker.io/distro/server:1.0");
        assert_eq!(
            container["env"],
            json!([
                {"name": "LOG_LEVEL", "value": "debug"},
                {"name": "EXTRA", "value": "1"}
            ])
        );
        assert_eq!(container["name"], "server");
    }

    #[test]
    fn test_container_list_override_drops_rendered_entries() {
        let ctx = ManifestContext {
            container_overrides: as_map(json!({"env": [{"name": "EXTRA", "value": "1"}]})),
            ..Default::default()
        };
        let mut d = deployment();
        ctx.apply_to_deployment(&mut d).unwrap();
        assert_eq!(
            d.pointer("/spec/template/spec/containers/0/env"),
            Some(&json!([{"name": "EXTRA", "value": "1"}]))
        );
    }

    #[test]
    fn test_pod_overrides_merge_key_by_key() {
        let ctx = ManifestContext {
            pod_overrides: as_map(json!({
                "serviceAccountName": "custom",
                "volumes": [{"name": "ca", "configMap": {"name": "ca-bundle"}}]
            })),
            ..Default::default()
        };
        let mut d = deployment();
        ctx.apply_to_deployment(&mut d).unwrap();
        let spec = d.pointer("/spec/template/spec").unwrap();
        assert_eq!(spec["serviceAccountName"], "custom");
        // Rendered volumes are replaced, not extended.
        assert_eq!(
            spec["volumes"],
            json!([{"name": "ca", "configMap": {"name": "ca-bundle"}}])
        );
        assert_eq!(spec["containers"][0]["image"], "placeholder");
    }

    #[test]
    fn test_missing_pod_spec_is_an_error() {
        let mut d = Manifest::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "server"},
            "spec": {"template": {}}
        }))
        .unwrap();
        let err = ManifestContext::default().apply_to_deployment(&mut d).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidDeployment { .. }));
    }
}
