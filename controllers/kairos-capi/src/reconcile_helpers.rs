//! Helper functions for common reconciliation patterns
//!
//! Naming, labelling, ownership lookups and status diffing shared by the
//! bootstrap and control plane reconcilers.

use crate::error::ControllerError;
use crds::{CLUSTER_NAME_LABEL, CONTROL_PLANE_LABEL, CONTROL_PLANE_NAME_LABEL, PAUSED_ANNOTATION};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// API group of the Cluster API core types
pub const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io";

/// Whether a status patch is needed
///
/// Status is only written when the computed status differs from the stored
/// one, so a quiet reconcile does not produce a watch event of its own.
pub fn status_needs_update<S: PartialEq>(current: Option<&S>, desired: &S) -> bool {
    current != Some(desired)
}

/// Paused through the spec flag or the Cluster API paused annotation
pub fn is_paused(meta: &ObjectMeta, spec_pause: bool) -> bool {
    spec_pause
        || meta
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(PAUSED_ANNOTATION))
}

/// `namespace/name`, used as the key in log lines and backoff tables
pub fn object_key<K: Resource>(resource: &K) -> String {
    format!("{}/{}", resource.namespace().unwrap_or_default(), resource.name_any())
}

/// Namespace of a namespaced resource
pub fn resource_namespace<K: Resource>(resource: &K) -> Result<String, ControllerError> {
    resource
        .namespace()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| ControllerError::InvalidResource(format!("{} has no namespace", resource.name_any())))
}

fn owner_of_kind<'a>(meta: &'a ObjectMeta, kind: &str) -> Option<&'a OwnerReference> {
    meta.owner_references.as_ref()?.iter().find(|owner| {
        owner.kind == kind && crds::split_api_version(&owner.api_version).0 == CLUSTER_API_GROUP
    })
}

/// Name of the Cluster API `Machine` owning this object
pub fn owner_machine_name(meta: &ObjectMeta) -> Option<String> {
    owner_of_kind(meta, "Machine").map(|owner| owner.name.clone())
}

/// Cluster name from the cluster-name label, falling back to the owning `Cluster`
pub fn cluster_name_for(meta: &ObjectMeta) -> Option<String> {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(CLUSTER_NAME_LABEL))
        .filter(|name| !name.is_empty())
        .cloned()
        .or_else(|| owner_of_kind(meta, "Cluster").map(|owner| owner.name.clone()))
}

/// Name shared by every object belonging to one control plane slot
pub fn slot_name(control_plane_name: &str, index: usize) -> String {
    format!("{}-{}", control_plane_name, index)
}

/// Selector matching the Machines of one control plane
pub fn control_plane_selector(control_plane_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(CONTROL_PLANE_NAME_LABEL.to_string(), control_plane_name.to_string())])
}

/// Labels carried by every object created for a control plane slot
pub fn control_plane_labels(cluster_name: &str, control_plane_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string()),
        (CONTROL_PLANE_LABEL.to_string(), String::new()),
        (CONTROL_PLANE_NAME_LABEL.to_string(), control_plane_name.to_string()),
    ])
}

/// Label selector string, as published in `status.selector`
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Controller owner reference pointing at `owner`
pub fn controller_owner_ref<K>(owner: &K) -> Result<OwnerReference, ControllerError>
where
    K: Resource<DynamicType = ()>,
{
    owner.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "{} {} has no uid yet",
            K::kind(&()),
            owner.meta().name.as_deref().unwrap_or("<unnamed>")
        ))
    })
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod reconcile_helpers_test;
