//! Resource document model
//!
//! `Manifest` is the one representation used for both desired (rendered) and
//! live (fetched) objects. It wraps the raw JSON tree so arbitrary kinds can be
//! handled without typed bindings, and exposes navigation helpers that return
//! `None` instead of failing on unexpected shapes.

use crate::error::ClusterError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::GroupVersionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A Kubernetes object as a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    doc: Value,
}

/// Identity of an object inside a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub group: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            group: gvk.group.clone(),
            kind: gvk.kind.clone(),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Splits an `apiVersion` string into group and version.
pub fn gvk_from_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

impl Manifest {
    /// Wraps a JSON document, checking that it carries `apiVersion`, `kind`
    /// and `metadata.name`.
    pub fn from_value(doc: Value) -> Result<Self, ClusterError> {
        let Some(obj) = doc.as_object() else {
            return Err(ClusterError::InvalidResource("document is not a mapping".to_string()));
        };
        let api_version = obj.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
        let kind = obj.get("kind").and_then(Value::as_str).unwrap_or_default();
        if api_version.is_empty() || kind.is_empty() {
            return Err(ClusterError::InvalidResource(
                "document is missing apiVersion or kind".to_string(),
            ));
        }
        let name = obj
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if name.is_empty() {
            return Err(ClusterError::InvalidResource(format!(
                "{kind} is missing metadata.name"
            )));
        }
        Ok(Self { doc })
    }

    /// Serializes any Kubernetes object (typed or dynamic) into a manifest.
    pub fn from_object<T: Serialize>(obj: &T) -> Result<Self, ClusterError> {
        Self::from_value(serde_json::to_value(obj)?)
    }

    pub fn api_version(&self) -> &str {
        self.str_at(&["apiVersion"]).unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.str_at(&["kind"]).unwrap_or_default()
    }

    pub fn gvk(&self) -> GroupVersionKind {
        gvk_from_api_version(self.api_version(), self.kind())
    }

    pub fn name(&self) -> &str {
        self.str_at(&["metadata", "name"]).unwrap_or_default()
    }

    /// Namespace, treating an empty string as unset.
    pub fn namespace(&self) -> Option<&str> {
        self.str_at(&["metadata", "namespace"]).filter(|ns| !ns.is_empty())
    }

    pub fn uid(&self) -> Option<&str> {
        self.str_at(&["metadata", "uid"])
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.str_at(&["metadata", "resourceVersion"])
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.gvk(), self.namespace(), self.name())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.doc
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.get(key))
            .and_then(Value::as_str)
    }

    /// UIDs of all owner references, skipping malformed entries.
    pub fn owner_uids(&self) -> impl Iterator<Item = &str> {
        self.doc
            .get("metadata")
            .and_then(|m| m.get("ownerReferences"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|r| r.get("uid").and_then(Value::as_str))
    }

    pub fn owner_references(&self) -> Result<Vec<OwnerReference>, ClusterError> {
        match self.doc.get("metadata").and_then(|m| m.get("ownerReferences")) {
            Some(refs) => Ok(serde_json::from_value(refs.clone())?),
            None => Ok(Vec::new()),
        }
    }

    /// Sets `owner` as the controller reference, replacing any previous
    /// controller reference and keeping non-controller ones.
    pub fn set_controller_reference(&mut self, owner: OwnerReference) -> Result<(), ClusterError> {
        let mut refs: Vec<OwnerReference> = self
            .owner_references()?
            .into_iter()
            .filter(|r| r.controller != Some(true) && r.uid != owner.uid)
            .collect();
        refs.push(owner);
        let refs = serde_json::to_value(refs)?;
        if let Some(meta) = self.metadata_mut() {
            meta.insert("ownerReferences".to_string(), refs);
        }
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) {
        if let Some(meta) = self.metadata_mut() {
            meta.insert("name".to_string(), Value::String(name.to_string()));
        }
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        if let Some(meta) = self.metadata_mut() {
            meta.insert("namespace".to_string(), Value::String(namespace.to_string()));
        }
    }

    /// Drops `metadata.namespace`, for kinds that turn out to be cluster-scoped.
    pub fn clear_namespace(&mut self) {
        if let Some(meta) = self.metadata_mut() {
            meta.remove("namespace");
        }
    }

    /// JSON-pointer lookup (RFC 6901).
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.doc.pointer(pointer)
    }

    pub fn as_value(&self) -> &Value {
        &self.doc
    }

    /// Mutable access to the document. Callers must keep `apiVersion`,
    /// `kind` and `metadata.name` intact.
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.doc
    }

    pub fn into_value(self) -> Value {
        self.doc
    }

    fn str_at(&self, path: &[&str]) -> Option<&str> {
        let mut cur = &self.doc;
        for seg in path {
            cur = cur.get(seg)?;
        }
        cur.as_str()
    }

    fn metadata_mut(&mut self) -> Option<&mut Map<String, Value>> {
        let root = self.doc.as_object_mut()?;
        let meta = root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        meta.as_object_mut()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> Manifest {
        Manifest::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": "svc",
                "namespace": "ns1",
                "labels": {"app.kubernetes.io/managed-by": "distro-operator"},
                "ownerReferences": [
                    {"apiVersion": "v1", "kind": "ConfigMap", "name": "a", "uid": "uid-a"},
                    {"apiVersion": "v1", "kind": "ConfigMap", "name": "b"}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_from_value_rejects_missing_identity() {
        assert!(Manifest::from_value(json!({"kind": "Service", "metadata": {"name": "x"}})).is_err());
        assert!(Manifest::from_value(json!({"apiVersion": "v1", "kind": "Service", "metadata": {}})).is_err());
        assert!(Manifest::from_value(json!(["not", "a", "map"])).is_err());
    }

    #[test]
    fn test_gvk_core_and_grouped() {
        let gvk = service().gvk();
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");

        let gvk = gvk_from_api_version("rbac.authorization.k8s.io/v1", "ClusterRole");
        assert_eq!(gvk.group, "rbac.authorization.k8s.io");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "ClusterRole");
    }

    #[test]
    fn test_owner_uids_skip_malformed_entries() {
        let svc = service();
        let uids: Vec<&str> = svc.owner_uids().collect();
        assert_eq!(uids, vec!["uid-a"]);
    }

    #[test]
    fn test_label_lookup() {
        let svc = service();
        assert_eq!(svc.label("app.kubernetes.io/managed-by"), Some("distro-operator"));
        assert_eq!(svc.label("missing"), None);
    }

    #[test]
    fn test_set_controller_reference_replaces_previous_controller() {
        let mut m = Manifest::from_value(json!({
            "apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cm"}
        }))
        .unwrap();
        let first = OwnerReference {
            api_version: "v1".into(),
            kind: "X".into(),
            name: "one".into(),
            uid: "1".into(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };
        let second = OwnerReference { name: "two".into(), uid: "2".into(), ..first.clone() };
        m.set_controller_reference(first).unwrap();
        m.set_controller_reference(second).unwrap();
        let uids: Vec<&str> = m.owner_uids().collect();
        assert_eq!(uids, vec!["2"]);
    }

    #[test]
    fn test_empty_namespace_is_none() {
        let mut m = service();
        m.set_namespace("");
        assert_eq!(m.namespace(), None);
        assert_eq!(m.key().to_string(), "Service/svc");
    }
}
