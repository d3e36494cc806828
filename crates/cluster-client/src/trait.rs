//! Store and secret lookup traits
//!
//! These traits abstract the Kubernetes API so reconcilers can be unit tested
//! against `MockClusterClient`. `ClusterClient` implements both.

use crate::error::ClusterError;
use crds::{
    Cluster, KairosConfig, KairosConfigStatus, KairosConfigTemplate, KairosControlPlaneStatus, Machine,
    ObjectReference,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use std::collections::BTreeMap;

/// Namespaced object store used by the reconcilers
///
/// All methods are single-object calls. Creates fail with
/// `ClusterError::AlreadyExists` on name collisions so callers can treat
/// retries as idempotent.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // Bootstrap provider objects
    async fn get_kairos_config(&self, namespace: &str, name: &str) -> Result<KairosConfig, ClusterError>;
    async fn create_kairos_config(&self, config: &KairosConfig) -> Result<KairosConfig, ClusterError>;
    async fn patch_kairos_config_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KairosConfigStatus,
    ) -> Result<(), ClusterError>;
    async fn get_kairos_config_template(&self, namespace: &str, name: &str) -> Result<KairosConfigTemplate, ClusterError>;

    // Control plane provider objects
    async fn patch_kairos_control_plane_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KairosControlPlaneStatus,
    ) -> Result<(), ClusterError>;

    // Cluster API core objects
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster, ClusterError>;
    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError>;
    async fn list_machines(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Machine>, ClusterError>;
    async fn create_machine(&self, machine: &Machine) -> Result<Machine, ClusterError>;
    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Create or update a Secret (server-side apply)
    async fn apply_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;

    // Untyped objects (infrastructure templates and machines)

    /// Fetch an object by reference; the reference's namespace overrides `namespace`
    async fn get_object(&self, namespace: &str, reference: &ObjectReference) -> Result<DynamicObject, ClusterError>;

    /// Create an object; its `types` must carry apiVersion and kind
    async fn create_object(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError>;

    /// Replace `metadata.ownerReferences` of the referenced object
    async fn set_owner_references(
        &self,
        namespace: &str,
        reference: &ObjectReference,
        owners: Vec<OwnerReference>,
    ) -> Result<(), ClusterError>;
}

/// Read-only access to Secret data
#[async_trait::async_trait]
pub trait SecretLookup: Send + Sync {
    /// Raw bytes stored under `key` in Secret `namespace/name`
    ///
    /// A missing Secret or a missing key both yield `ClusterError::NotFound`.
    async fn get_secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>, ClusterError>;
}
