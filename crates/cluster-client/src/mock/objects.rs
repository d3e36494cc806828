//! Untyped objects for MockClusterClient

use super::{MockClusterClient, key, lock};
use crate::error::ClusterError;
use crds::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use kube::api::DynamicObject;

pub fn get_object(
    client: &MockClusterClient,
    namespace: &str,
    reference: &ObjectReference,
) -> Result<DynamicObject, ClusterError> {
    let namespace = reference.namespace_or(namespace);
    lock(&client.objects)
        .get(&(reference.kind.clone(), namespace.to_string(), reference.name.clone()))
        .cloned()
        .ok_or_else(|| ClusterError::NotFound(format!("{} {}/{}", reference.kind, namespace, reference.name)))
}

pub fn create_object(client: &MockClusterClient, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
    let kind = object
        .types
        .as_ref()
        .map(|t| t.kind.clone())
        .ok_or_else(|| ClusterError::InvalidObject(format!("object {} has no apiVersion/kind", object.name_any())))?;
    let namespace = object.namespace().unwrap_or_default();
    let name = object.name_any();
    client.check_create_failure(&kind, &name)?;

    let mut objects = lock(&client.objects);
    let k = (kind.clone(), namespace.clone(), name.clone());
    if objects.contains_key(&k) {
        return Err(ClusterError::AlreadyExists(format!("{} {}/{}", kind, namespace, name)));
    }

    let mut created = object.clone();
    client.stamp_created(&mut created.metadata);
    objects.insert(k, created.clone());
    Ok(created)
}

/// KairosConfigs are stored typed; every other kind lives in the untyped map
pub fn set_owner_references(
    client: &MockClusterClient,
    namespace: &str,
    reference: &ObjectReference,
    owners: Vec<OwnerReference>,
) -> Result<(), ClusterError> {
    let namespace = reference.namespace_or(namespace);
    let not_found = || ClusterError::NotFound(format!("{} {}/{}", reference.kind, namespace, reference.name));

    if reference.kind == "KairosConfig" {
        let mut configs = lock(&client.kairos_configs);
        let config = configs.get_mut(&key(namespace, &reference.name)).ok_or_else(not_found)?;
        config.metadata.owner_references = Some(owners);
        return Ok(());
    }

    let mut objects = lock(&client.objects);
    let object = objects
        .get_mut(&(reference.kind.clone(), namespace.to_string(), reference.name.clone()))
        .ok_or_else(not_found)?;
    object.metadata.owner_references = Some(owners);
    Ok(())
}
