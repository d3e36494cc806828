//! Kubernetes-backed implementation of the store and secret lookup traits

use crate::cluster_trait::{ClusterClientTrait, SecretLookup};
use crate::error::ClusterError;
use crds::{
    Cluster, KairosConfig, KairosConfigStatus, KairosConfigTemplate, KairosControlPlane, KairosControlPlaneStatus,
    Machine, ObjectReference, split_api_version,
};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams, PostParams,
};
use kube::{Client, Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::debug;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "kairos-capi";

/// Store backed by a live Kubernetes API server
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient").finish_non_exhaustive()
    }
}

impl ClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn dynamic(&self, namespace: &str, api_version: &str, kind: &str) -> Api<DynamicObject> {
        let (group, version) = split_api_version(api_version);
        let gvk = GroupVersionKind {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        };
        Api::namespaced_with(self.client.clone(), namespace, &ApiResource::from_gvk(&gvk))
    }

    /// Server-side apply of a status object, so fields this manager stops setting are removed
    async fn apply_status<K>(&self, namespace: &str, name: &str, status: serde_json::Value) -> Result<(), ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.namespaced(namespace);
        let dt = <K as Resource>::DynamicType::default();
        let patch = serde_json::json!({
            "apiVersion": K::api_version(&dt),
            "kind": K::kind(&dt),
            "status": status,
        });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&patch))
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("{} {}/{}", K::kind(&dt), namespace, name)))?;
        Ok(())
    }
}

fn object_namespace<K: Resource>(object: &K) -> Result<String, ClusterError> {
    object
        .meta()
        .namespace
        .clone()
        .ok_or_else(|| ClusterError::InvalidObject(format!("object {} has no namespace", object.meta().name.as_deref().unwrap_or("<unnamed>"))))
}

#[async_trait::async_trait]
impl ClusterClientTrait for ClusterClient {
    async fn get_kairos_config(&self, namespace: &str, name: &str) -> Result<KairosConfig, ClusterError> {
        self.namespaced::<KairosConfig>(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("KairosConfig {}/{}", namespace, name)))
    }

    async fn create_kairos_config(&self, config: &KairosConfig) -> Result<KairosConfig, ClusterError> {
        let namespace = object_namespace(config)?;
        debug!("Creating KairosConfig {}/{}", namespace, config.name_any());
        self.namespaced::<KairosConfig>(&namespace)
            .create(&PostParams::default(), config)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("KairosConfig {}/{}", namespace, config.name_any())))
    }

    async fn patch_kairos_config_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KairosConfigStatus,
    ) -> Result<(), ClusterError> {
        self.apply_status::<KairosConfig>(namespace, name, serde_json::to_value(status)?).await
    }

    async fn get_kairos_config_template(&self, namespace: &str, name: &str) -> Result<KairosConfigTemplate, ClusterError> {
        self.namespaced::<KairosConfigTemplate>(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("KairosConfigTemplate {}/{}", namespace, name)))
    }

    async fn patch_kairos_control_plane_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KairosControlPlaneStatus,
    ) -> Result<(), ClusterError> {
        self.apply_status::<KairosControlPlane>(namespace, name, serde_json::to_value(status)?).await
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster, ClusterError> {
        self.namespaced::<Cluster>(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("Cluster {}/{}", namespace, name)))
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError> {
        self.namespaced::<Machine>(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("Machine {}/{}", namespace, name)))
    }

    async fn list_machines(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Machine>, ClusterError> {
        let selector = labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        let list = self
            .namespaced::<Machine>(namespace)
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("Machines in {} ({})", namespace, selector)))?;
        Ok(list.items)
    }

    async fn create_machine(&self, machine: &Machine) -> Result<Machine, ClusterError> {
        let namespace = object_namespace(machine)?;
        debug!("Creating Machine {}/{}", namespace, machine.name_any());
        self.namespaced::<Machine>(&namespace)
            .create(&PostParams::default(), machine)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("Machine {}/{}", namespace, machine.name_any())))
    }

    /// Deleting an object that is already gone succeeds
    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        debug!("Deleting Machine {}/{}", namespace, name);
        match self
            .namespaced::<Machine>(namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match ClusterError::from_kube(e, format!("Machine {}/{}", namespace, name)) {
                ClusterError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn apply_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let namespace = object_namespace(secret)?;
        let name = secret.name_any();
        debug!("Applying Secret {}/{}", namespace, name);
        self.namespaced::<Secret>(&namespace)
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(secret))
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("Secret {}/{}", namespace, name)))
    }

    async fn get_object(&self, namespace: &str, reference: &ObjectReference) -> Result<DynamicObject, ClusterError> {
        let namespace = reference.namespace_or(namespace);
        self.dynamic(namespace, &reference.api_version, &reference.kind)
            .get(&reference.name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("{} {}/{}", reference.kind, namespace, reference.name)))
    }

    async fn create_object(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| ClusterError::InvalidObject(format!("object {} has no apiVersion/kind", object.name_any())))?;
        let namespace = object_namespace(object)?;
        debug!("Creating {} {}/{}", types.kind, namespace, object.name_any());
        self.dynamic(&namespace, &types.api_version, &types.kind)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("{} {}/{}", types.kind, namespace, object.name_any())))
    }

    async fn set_owner_references(
        &self,
        namespace: &str,
        reference: &ObjectReference,
        owners: Vec<OwnerReference>,
    ) -> Result<(), ClusterError> {
        let namespace = reference.namespace_or(namespace);
        let patch = serde_json::json!({ "metadata": { "ownerReferences": owners } });
        self.dynamic(namespace, &reference.api_version, &reference.kind)
            .patch(&reference.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("{} {}/{}", reference.kind, namespace, reference.name)))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SecretLookup for ClusterClient {
    async fn get_secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>, ClusterError> {
        let secret = self
            .namespaced::<Secret>(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, format!("Secret {}/{}", namespace, name)))?;

        secret
            .data
            .and_then(|mut data| data.remove(key))
            .map(|value| value.0)
            .ok_or_else(|| ClusterError::NotFound(format!("key {} in Secret {}/{}", key, namespace, name)))
    }
}
