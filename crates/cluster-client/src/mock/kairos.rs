//! Kairos provider objects for MockClusterClient

use super::{MockClusterClient, key, lock};
use crate::error::ClusterError;
use crds::{KairosConfig, KairosConfigStatus, KairosConfigTemplate, KairosControlPlaneStatus};
use kube::ResourceExt;

pub fn get_kairos_config(client: &MockClusterClient, namespace: &str, name: &str) -> Result<KairosConfig, ClusterError> {
    lock(&client.kairos_configs)
        .get(&key(namespace, name))
        .cloned()
        .ok_or_else(|| ClusterError::NotFound(format!("KairosConfig {}/{}", namespace, name)))
}

pub fn create_kairos_config(client: &MockClusterClient, config: &KairosConfig) -> Result<KairosConfig, ClusterError> {
    let namespace = config.namespace().unwrap_or_default();
    let name = config.name_any();
    client.check_create_failure("KairosConfig", &name)?;

    let mut configs = lock(&client.kairos_configs);
    let k = key(&namespace, &name);
    if configs.contains_key(&k) {
        return Err(ClusterError::AlreadyExists(format!("KairosConfig {}/{}", namespace, name)));
    }

    let mut created = config.clone();
    client.stamp_created(&mut created.metadata);
    configs.insert(k, created.clone());
    Ok(created)
}

pub fn patch_kairos_config_status(
    client: &MockClusterClient,
    namespace: &str,
    name: &str,
    status: &KairosConfigStatus,
) -> Result<(), ClusterError> {
    let mut configs = lock(&client.kairos_configs);
    let config = configs
        .get_mut(&key(namespace, name))
        .ok_or_else(|| ClusterError::NotFound(format!("KairosConfig {}/{}", namespace, name)))?;
    config.status = Some(status.clone());
    *lock(&client.status_patches) += 1;
    Ok(())
}

pub fn get_kairos_config_template(
    client: &MockClusterClient,
    namespace: &str,
    name: &str,
) -> Result<KairosConfigTemplate, ClusterError> {
    lock(&client.kairos_config_templates)
        .get(&key(namespace, name))
        .cloned()
        .ok_or_else(|| ClusterError::NotFound(format!("KairosConfigTemplate {}/{}", namespace, name)))
}

pub fn patch_kairos_control_plane_status(
    client: &MockClusterClient,
    namespace: &str,
    name: &str,
    status: &KairosControlPlaneStatus,
) -> Result<(), ClusterError> {
    lock(&client.control_plane_statuses).insert(key(namespace, name), status.clone());
    *lock(&client.status_patches) += 1;
    Ok(())
}
