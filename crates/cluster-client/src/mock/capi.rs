//! Cluster API core objects and Secrets for MockClusterClient

use super::{MockClusterClient, key, lock};
use crate::error::ClusterError;
use crds::{Cluster, Machine};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub fn get_cluster(client: &MockClusterClient, namespace: &str, name: &str) -> Result<Cluster, ClusterError> {
    lock(&client.clusters)
        .get(&key(namespace, name))
        .cloned()
        .ok_or_else(|| ClusterError::NotFound(format!("Cluster {}/{}", namespace, name)))
}

pub fn get_machine(client: &MockClusterClient, namespace: &str, name: &str) -> Result<Machine, ClusterError> {
    lock(&client.machines)
        .get(&key(namespace, name))
        .cloned()
        .ok_or_else(|| ClusterError::NotFound(format!("Machine {}/{}", namespace, name)))
}

/// Machines in `namespace` carrying every label in `labels`
pub fn list_machines(
    client: &MockClusterClient,
    namespace: &str,
    labels: &BTreeMap<String, String>,
) -> Result<Vec<Machine>, ClusterError> {
    let machines = lock(&client.machines);
    let mut matching: Vec<Machine> = machines
        .iter()
        .filter(|((ns, _), _)| ns == namespace)
        .filter(|(_, machine)| {
            let machine_labels = machine.labels();
            labels.iter().all(|(k, v)| machine_labels.get(k) == Some(v))
        })
        .map(|(_, machine)| machine.clone())
        .collect();
    matching.sort_by_key(ResourceExt::name_any);
    Ok(matching)
}

pub fn create_machine(client: &MockClusterClient, machine: &Machine) -> Result<Machine, ClusterError> {
    let namespace = machine.namespace().unwrap_or_default();
    let name = machine.name_any();
    client.check_create_failure("Machine", &name)?;

    let mut machines = lock(&client.machines);
    let k = key(&namespace, &name);
    if machines.contains_key(&k) {
        return Err(ClusterError::AlreadyExists(format!("Machine {}/{}", namespace, name)));
    }

    let mut created = machine.clone();
    client.stamp_created(&mut created.metadata);
    machines.insert(k, created.clone());
    Ok(created)
}

pub fn delete_machine(client: &MockClusterClient, namespace: &str, name: &str) -> Result<(), ClusterError> {
    lock(&client.machines).remove(&key(namespace, name));
    Ok(())
}

pub fn apply_secret(client: &MockClusterClient, secret: &Secret) -> Result<Secret, ClusterError> {
    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();
    client.check_create_failure("Secret", &name)?;

    let mut secrets = lock(&client.secrets);
    let mut applied = secret.clone();
    match secrets.get(&key(&namespace, &name)) {
        Some(existing) => applied.metadata.uid.clone_from(&existing.metadata.uid),
        None => client.stamp_created(&mut applied.metadata),
    }
    secrets.insert(key(&namespace, &name), applied.clone());
    Ok(applied)
}

pub fn get_secret_value(
    client: &MockClusterClient,
    namespace: &str,
    name: &str,
    data_key: &str,
) -> Result<Vec<u8>, ClusterError> {
    lock(&client.secret_lookups).push(key(namespace, name));
    lock(&client.secrets)
        .get(&key(namespace, name))
        .ok_or_else(|| ClusterError::NotFound(format!("Secret {}/{}", namespace, name)))?
        .data
        .as_ref()
        .and_then(|data| data.get(data_key))
        .map(|value| value.0.clone())
        .ok_or_else(|| ClusterError::NotFound(format!("key {} in Secret {}/{}", data_key, namespace, name)))
}
