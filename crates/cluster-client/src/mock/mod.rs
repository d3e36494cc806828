//! Mock ClusterClient for unit testing
//!
//! This module provides an in-memory implementation of `ClusterClientTrait`
//! and `SecretLookup` that can be used in unit tests without a Kubernetes API
//! server.
//!
//! The mock is organized into domain-specific modules:
//! - `kairos.rs` - KairosConfig, KairosConfigTemplate and KairosControlPlane status
//! - `capi.rs` - Cluster API Machines and Clusters, Secrets
//! - `objects.rs` - untyped infrastructure objects

mod capi;
mod kairos;
mod objects;

use crate::cluster_trait::{ClusterClientTrait, SecretLookup};
use crate::error::ClusterError;
use chrono::{SecondsFormat, Utc};
use crds::{
    Cluster, KairosConfig, KairosConfigStatus, KairosConfigTemplate, KairosControlPlaneStatus, Machine,
    ObjectReference,
};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use kube::ResourceExt;
use kube::api::DynamicObject;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// `(namespace, name)`
pub(crate) type Key = (String, String);

/// `(kind, namespace, name)`
pub(crate) type ObjectKey = (String, String, String);

/// Mock ClusterClient for testing
///
/// Objects live in memory. Creates assign a uid, generation 1 and a creation
/// timestamp. Individual creates can be made to fail with `fail_create`.
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    pub(crate) kairos_configs: Arc<Mutex<HashMap<Key, KairosConfig>>>,
    pub(crate) kairos_config_templates: Arc<Mutex<HashMap<Key, KairosConfigTemplate>>>,
    pub(crate) control_plane_statuses: Arc<Mutex<HashMap<Key, KairosControlPlaneStatus>>>,
    pub(crate) clusters: Arc<Mutex<HashMap<Key, Cluster>>>,
    pub(crate) machines: Arc<Mutex<HashMap<Key, Machine>>>,
    pub(crate) secrets: Arc<Mutex<HashMap<Key, Secret>>>,
    pub(crate) objects: Arc<Mutex<HashMap<ObjectKey, DynamicObject>>>,
    // (kind, name) pairs whose create fails
    pub(crate) create_failures: Arc<Mutex<HashSet<(String, String)>>>,
    pub(crate) secret_lookups: Arc<Mutex<Vec<Key>>>,
    pub(crate) status_patches: Arc<Mutex<usize>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

impl MockClusterClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&self) -> u64 {
        let mut id = lock(&self.next_id);
        *id += 1;
        *id
    }

    /// Stamp server-populated metadata onto a newly created object
    pub(crate) fn stamp_created(&self, meta: &mut ObjectMeta) {
        meta.uid = Some(format!("mock-uid-{}", self.next_id()));
        meta.generation = Some(1);
        meta.resource_version = Some("1".to_string());
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = now();
        }
    }

    pub(crate) fn check_create_failure(&self, kind: &str, name: &str) -> Result<(), ClusterError> {
        if lock(&self.create_failures).contains(&(kind.to_string(), name.to_string())) {
            return Err(ClusterError::Conflict(format!("injected failure creating {} {}", kind, name)));
        }
        Ok(())
    }

    // Setup helpers

    pub fn add_kairos_config(&self, config: KairosConfig) {
        let k = key(&config.namespace().unwrap_or_default(), &config.name_any());
        lock(&self.kairos_configs).insert(k, config);
    }

    pub fn add_kairos_config_template(&self, template: KairosConfigTemplate) {
        let k = key(&template.namespace().unwrap_or_default(), &template.name_any());
        lock(&self.kairos_config_templates).insert(k, template);
    }

    pub fn add_cluster(&self, cluster: Cluster) {
        let k = key(&cluster.namespace().unwrap_or_default(), &cluster.name_any());
        lock(&self.clusters).insert(k, cluster);
    }

    pub fn add_machine(&self, machine: Machine) {
        let k = key(&machine.namespace().unwrap_or_default(), &machine.name_any());
        lock(&self.machines).insert(k, machine);
    }

    /// Add a Secret with string values
    pub fn add_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        };
        lock(&self.secrets).insert(key(namespace, name), secret);
    }

    /// Add an untyped object; its `types` must be set
    pub fn add_object(&self, object: DynamicObject) {
        let kind = object.types.as_ref().map(|t| t.kind.clone()).unwrap_or_default();
        let k = (kind, object.namespace().unwrap_or_default(), object.name_any());
        lock(&self.objects).insert(k, object);
    }

    /// Make every create of `kind` named `name` fail with a conflict
    pub fn fail_create(&self, kind: &str, name: &str) {
        lock(&self.create_failures).insert((kind.to_string(), name.to_string()));
    }

    // Inspection helpers

    pub fn kairos_config(&self, namespace: &str, name: &str) -> Option<KairosConfig> {
        lock(&self.kairos_configs).get(&key(namespace, name)).cloned()
    }

    pub fn control_plane_status(&self, namespace: &str, name: &str) -> Option<KairosControlPlaneStatus> {
        lock(&self.control_plane_statuses).get(&key(namespace, name)).cloned()
    }

    pub fn machine(&self, namespace: &str, name: &str) -> Option<Machine> {
        lock(&self.machines).get(&key(namespace, name)).cloned()
    }

    /// All machines in a namespace, sorted by name
    pub fn machines(&self, namespace: &str) -> Vec<Machine> {
        let mut machines: Vec<Machine> = lock(&self.machines)
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, m)| m.clone())
            .collect();
        machines.sort_by_key(ResourceExt::name_any);
        machines
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        lock(&self.secrets).get(&key(namespace, name)).cloned()
    }

    /// String value stored under `key` in a Secret
    pub fn secret_string(&self, namespace: &str, name: &str, data_key: &str) -> Option<String> {
        self.secret(namespace, name)
            .and_then(|s| s.data)
            .and_then(|d| d.get(data_key).map(|v| String::from_utf8_lossy(&v.0).into_owned()))
    }

    pub fn object(&self, kind: &str, namespace: &str, name: &str) -> Option<DynamicObject> {
        lock(&self.objects)
            .get(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of `get_secret_value` calls made so far
    pub fn secret_lookup_count(&self) -> usize {
        lock(&self.secret_lookups).len()
    }

    /// Number of status patches (any kind) made so far
    pub fn status_patch_count(&self) -> usize {
        *lock(&self.status_patches)
    }
}

fn now() -> Option<Time> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    serde_json::from_value(serde_json::Value::String(timestamp)).ok()
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_kairos_config(&self, namespace: &str, name: &str) -> Result<KairosConfig, ClusterError> {
        kairos::get_kairos_config(self, namespace, name)
    }

    async fn create_kairos_config(&self, config: &KairosConfig) -> Result<KairosConfig, ClusterError> {
        kairos::create_kairos_config(self, config)
    }

    async fn patch_kairos_config_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KairosConfigStatus,
    ) -> Result<(), ClusterError> {
        kairos::patch_kairos_config_status(self, namespace, name, status)
    }

    async fn get_kairos_config_template(&self, namespace: &str, name: &str) -> Result<KairosConfigTemplate, ClusterError> {
        kairos::get_kairos_config_template(self, namespace, name)
    }

    async fn patch_kairos_control_plane_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KairosControlPlaneStatus,
    ) -> Result<(), ClusterError> {
        kairos::patch_kairos_control_plane_status(self, namespace, name, status)
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster, ClusterError> {
        capi::get_cluster(self, namespace, name)
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError> {
        capi::get_machine(self, namespace, name)
    }

    async fn list_machines(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Machine>, ClusterError> {
        capi::list_machines(self, namespace, labels)
    }

    async fn create_machine(&self, machine: &Machine) -> Result<Machine, ClusterError> {
        capi::create_machine(self, machine)
    }

    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        capi::delete_machine(self, namespace, name)
    }

    async fn apply_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        capi::apply_secret(self, secret)
    }

    async fn get_object(&self, namespace: &str, reference: &ObjectReference) -> Result<DynamicObject, ClusterError> {
        objects::get_object(self, namespace, reference)
    }

    async fn create_object(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        objects::create_object(self, object)
    }

    async fn set_owner_references(
        &self,
        namespace: &str,
        reference: &ObjectReference,
        owners: Vec<OwnerReference>,
    ) -> Result<(), ClusterError> {
        objects::set_owner_references(self, namespace, reference, owners)
    }
}

#[async_trait::async_trait]
impl SecretLookup for MockClusterClient {
    async fn get_secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>, ClusterError> {
        capi::get_secret_value(self, namespace, name, key)
    }
}
