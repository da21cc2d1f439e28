//! Mock ClusterClient for unit testing
//!
//! This module provides an in-memory implementation of `ClusterClientTrait`
//! that can be used in unit tests without a running API server. Every call is
//! recorded so tests can assert on exactly which writes were issued.

use crate::error::ClusterError;
use crate::models::{Manifest, ObjectKey};
use crate::cluster_trait::ClusterClientTrait;
use kube::core::GroupVersionKind;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Kinds the mock treats as cluster-scoped unless told otherwise.
const DEFAULT_CLUSTER_SCOPED: &[&str] = &[
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "Namespace",
    "PersistentVolume",
    "StorageClass",
];

/// API verbs the mock records and can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockVerb {
    Get,
    Create,
    Patch,
    Delete,
    List,
    Scope,
    PatchStatus,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub verb: MockVerb,
    pub kind: String,
    pub name: String,
    /// Whether the call changed stored state
    pub changed: bool,
}

/// Callback run after every recorded call.
pub type CallHook = Arc<dyn Fn(&MockCall) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct CallHooks(Vec<CallHook>);

impl fmt::Debug for CallHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallHooks({})", self.0.len())
    }
}

/// Mock ClusterClient for testing
///
/// Stores objects in memory keyed by group/kind/namespace/name. Server-side
/// apply is approximated by a recursive merge of the desired document into the
/// stored one (maps merge, lists and scalars replace).
#[derive(Debug, Clone)]
pub struct MockClusterClient {
    pub(crate) objects: Arc<Mutex<BTreeMap<ObjectKey, Manifest>>>,
    pub(crate) cluster_scoped: Arc<Mutex<HashSet<String>>>,
    pub(crate) failures: Arc<Mutex<HashMap<(MockVerb, String), String>>>,
    pub(crate) calls: Arc<Mutex<Vec<MockCall>>>,
    pub(crate) statuses: Arc<Mutex<Vec<(String, Value)>>>,
    pub(crate) next_version: Arc<Mutex<u64>>,
    pub(crate) hooks: Arc<Mutex<CallHooks>>,
}

impl Default for MockClusterClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClusterClient {
    /// Create a new, empty mock cluster
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            cluster_scoped: Arc::new(Mutex::new(
                DEFAULT_CLUSTER_SCOPED.iter().map(|k| (*k).to_string()).collect(),
            )),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            statuses: Arc::new(Mutex::new(Vec::new())),
            next_version: Arc::new(Mutex::new(1)),
            hooks: Arc::new(Mutex::new(CallHooks::default())),
        }
    }

    /// Marks a kind as cluster-scoped (for test setup)
    pub fn set_cluster_scoped(&self, kind: &str) {
        self.cluster_scoped.lock().unwrap().insert(kind.to_string());
    }

    /// Adds an object to the store as if it already existed (for test setup).
    /// A uid and resourceVersion are assigned when missing.
    pub fn add_object(&self, resource: Manifest) -> Manifest {
        let mut resource = resource;
        if resource.uid().is_none() {
            set_metadata_field(&mut resource, "uid", uuid::Uuid::new_v4().to_string());
        }
        let version = self.bump_version();
        set_metadata_field(&mut resource, "resourceVersion", version);
        let key = self.key_for(&resource.gvk(), resource.namespace(), resource.name());
        self.objects.lock().unwrap().insert(key, resource.clone());
        resource
    }

    /// Makes every `verb` call against an object called `name` fail with an
    /// API error (for test setup)
    pub fn fail_on(&self, verb: MockVerb, name: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert((verb, name.to_string()), message.to_string());
    }

    /// Runs `hook` after every call is recorded, including failed ones.
    /// Lets a test react mid-pass, for example by cancelling a token.
    pub fn on_call(&self, hook: impl Fn(&MockCall) + Send + Sync + 'static) {
        self.hooks.lock().unwrap().0.push(Arc::new(hook));
    }

    /// Looks up a stored object by kind, namespace and name
    pub fn find(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<Manifest> {
        let cluster_scoped = self.is_kind_cluster_scoped(kind);
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| {
                k.kind == kind
                    && k.name == name
                    && (cluster_scoped || k.namespace.as_deref() == namespace)
            })
            .map(|(_, v)| v.clone())
    }

    /// Every call issued so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of one verb
    pub fn calls_for(&self, verb: MockVerb) -> Vec<MockCall> {
        self.calls().into_iter().filter(|c| c.verb == verb).collect()
    }

    /// Number of calls that changed stored state
    pub fn mutations(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.changed).count()
    }

    /// Clears the call log, keeping stored objects
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Status patches received, as (name, status) pairs
    pub fn status_patches(&self) -> Vec<(String, Value)> {
        self.statuses.lock().unwrap().clone()
    }

    fn is_kind_cluster_scoped(&self, kind: &str) -> bool {
        self.cluster_scoped.lock().unwrap().contains(kind)
    }

    fn key_for(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> ObjectKey {
        if self.is_kind_cluster_scoped(&gvk.kind) {
            ObjectKey::new(gvk, None, name)
        } else {
            ObjectKey::new(gvk, namespace, name)
        }
    }

    fn bump_version(&self) -> String {
        let mut next = self.next_version.lock().unwrap();
        let current = *next;
        *next += 1;
        current.to_string()
    }

    fn record(&self, verb: MockVerb, kind: &str, name: &str, changed: bool) {
        let call = MockCall {
            verb,
            kind: kind.to_string(),
            name: name.to_string(),
            changed,
        };
        self.calls.lock().unwrap().push(call.clone());
        // Hooks run without any store lock held.
        let hooks = self.hooks.lock().unwrap().clone();
        for hook in &hooks.0 {
            hook(&call);
        }
    }

    fn injected_failure(&self, verb: MockVerb, name: &str) -> Result<(), ClusterError> {
        match self.failures.lock().unwrap().get(&(verb, name.to_string())) {
            Some(message) => Err(ClusterError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

fn set_metadata_field(resource: &mut Manifest, field: &str, value: String) {
    if let Some(meta) = resource
        .value_mut()
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
    {
        meta.insert(field.to_string(), Value::String(value));
    }
}

/// Recursive merge approximating server-side apply: maps merge key by key,
/// everything else is replaced.
fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> Result<Manifest, ClusterError> {
        self.record(MockVerb::Get, &gvk.kind, name, false);
        self.injected_failure(MockVerb::Get, name)?;
        let key = self.key_for(gvk, namespace, name);
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))
    }

    async fn create(&self, resource: &Manifest) -> Result<Manifest, ClusterError> {
        self.injected_failure(MockVerb::Create, resource.name()).inspect_err(|_| {
            self.record(MockVerb::Create, resource.kind(), resource.name(), false);
        })?;
        let key = self.key_for(&resource.gvk(), resource.namespace(), resource.name());
        if self.objects.lock().unwrap().contains_key(&key) {
            self.record(MockVerb::Create, resource.kind(), resource.name(), false);
            return Err(ClusterError::AlreadyExists(key.to_string()));
        }
        let mut created = resource.clone();
        set_metadata_field(&mut created, "uid", uuid::Uuid::new_v4().to_string());
        let version = self.bump_version();
        set_metadata_field(&mut created, "resourceVersion", version);
        self.objects.lock().unwrap().insert(key, created.clone());
        self.record(MockVerb::Create, resource.kind(), resource.name(), true);
        Ok(created)
    }

    async fn patch(&self, existing: &Manifest, desired: &Manifest, _field_owner: &str, _force: bool) -> Result<Manifest, ClusterError> {
        self.injected_failure(MockVerb::Patch, existing.name()).inspect_err(|_| {
            self.record(MockVerb::Patch, existing.kind(), existing.name(), false);
        })?;
        let key = self.key_for(&existing.gvk(), existing.namespace(), existing.name());
        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get(&key).cloned() else {
            drop(objects);
            self.record(MockVerb::Patch, existing.kind(), existing.name(), false);
            return Err(ClusterError::NotFound(key.to_string()));
        };
        let mut merged = stored.clone().into_value();
        merge_into(&mut merged, desired.as_value());
        let mut merged = Manifest::from_value(merged)?;
        let changed = merged != stored;
        if changed {
            set_metadata_field(&mut merged, "resourceVersion", self.bump_version());
            objects.insert(key, merged.clone());
        }
        drop(objects);
        self.record(MockVerb::Patch, existing.kind(), existing.name(), changed);
        Ok(merged)
    }

    async fn delete(&self, resource: &Manifest) -> Result<(), ClusterError> {
        self.injected_failure(MockVerb::Delete, resource.name()).inspect_err(|_| {
            self.record(MockVerb::Delete, resource.kind(), resource.name(), false);
        })?;
        let key = self.key_for(&resource.gvk(), resource.namespace(), resource.name());
        let removed = self.objects.lock().unwrap().remove(&key);
        self.record(MockVerb::Delete, resource.kind(), resource.name(), removed.is_some());
        match removed {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound(key.to_string())),
        }
    }

    async fn list(&self, gvk: &GroupVersionKind) -> Result<Vec<Manifest>, ClusterError> {
        self.record(MockVerb::List, &gvk.kind, "", false);
        self.injected_failure(MockVerb::List, &gvk.kind)?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.group == gvk.group && k.kind == gvk.kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn is_cluster_scoped(&self, gvk: &GroupVersionKind) -> Result<bool, ClusterError> {
        self.record(MockVerb::Scope, &gvk.kind, "", false);
        self.injected_failure(MockVerb::Scope, &gvk.kind)?;
        Ok(self.is_kind_cluster_scoped(&gvk.kind))
    }

    async fn patch_status(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str, status: &Value) -> Result<(), ClusterError> {
        self.injected_failure(MockVerb::PatchStatus, name)?;
        let key = self.key_for(gvk, namespace, name);
        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get_mut(&key) else {
            return Err(ClusterError::NotFound(key.to_string()));
        };
        if let Some(root) = stored.value_mut().as_object_mut() {
            root.insert("status".to_string(), status.clone());
        }
        drop(objects);
        self.statuses
            .lock()
            .unwrap()
            .push((name.to_string(), status.clone()));
        self.record(MockVerb::PatchStatus, &gvk.kind, name, true);
        Ok(())
    }
}
