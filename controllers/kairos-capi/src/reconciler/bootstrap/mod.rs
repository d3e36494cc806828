//! KairosConfig reconciler
//!
//! Renders the node's cloud-config once its Machine and Cluster are far enough
//! along, stores it in a data Secret and reports the Secret name in status.
//! Spec errors that cannot be fixed by retrying are recorded as a sticky
//! failure that holds until the spec generation changes.

pub mod cloud_config;
pub mod token;
#[cfg(test)]
mod kairos_config_test;

use super::{ReconcileOutcome, Reconciler, WAIT_REQUEUE};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    controller_owner_ref, is_paused, object_key, owner_machine_name, resource_namespace, status_needs_update,
};
use cloud_config::generate_cloud_config;
use crds::{
    ApiEndpoint, BOOTSTRAP_DATA_SECRET_AVAILABLE_REASON, BOOTSTRAP_DATA_SECRET_GENERATION_FAILED_REASON,
    BOOTSTRAP_READY_CONDITION, BOOTSTRAP_SUCCEEDED_REASON, CLUSTER_NAME_LABEL, Condition, ConditionSeverity,
    DATA_SECRET_AVAILABLE_CONDITION, KairosConfig, KairosConfigStatus, READY_CONDITION, Role,
    WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON, WAITING_FOR_CONTROL_PLANE_ENDPOINT_REASON,
    WAITING_FOR_CONTROL_PLANE_INITIALIZATION_REASON, set_condition,
};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Secret type Cluster API expects for bootstrap data
pub const BOOTSTRAP_SECRET_TYPE: &str = "cluster.x-k8s.io/secret";

/// Key holding the rendered document
pub const BOOTSTRAP_DATA_KEY: &str = "value";

/// Key holding the document format
pub const BOOTSTRAP_FORMAT_KEY: &str = "format";

pub const BOOTSTRAP_FORMAT_CLOUD_CONFIG: &str = "cloud-config";

/// The data Secret for `config`, named after it and owned by it
pub fn bootstrap_data_secret(
    config: &KairosConfig,
    document: &str,
    cluster_name: &str,
) -> Result<Secret, ControllerError> {
    let owner = controller_owner_ref(config)?;
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(config.name_any()),
            namespace: config.namespace(),
            labels: Some(BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string())])),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        type_: Some(BOOTSTRAP_SECRET_TYPE.to_string()),
        data: Some(BTreeMap::from([
            (BOOTSTRAP_DATA_KEY.to_string(), ByteString(document.as_bytes().to_vec())),
            (
                BOOTSTRAP_FORMAT_KEY.to_string(),
                ByteString(BOOTSTRAP_FORMAT_CLOUD_CONFIG.as_bytes().to_vec()),
            ),
        ])),
        ..Default::default()
    })
}

impl Reconciler {
    /// Reconcile a single KairosConfig
    pub async fn reconcile_kairos_config(&self, config: &KairosConfig) -> Result<ReconcileOutcome, ControllerError> {
        let key = object_key(config);
        let namespace = resource_namespace(config)?;
        let name = config.name_any();

        if is_paused(&config.metadata, config.spec.pause) {
            debug!("KairosConfig {} is paused, skipping", key);
            return Ok(ReconcileOutcome::Done);
        }

        let generation = config.metadata.generation;
        let current = config.status.as_ref();
        let mut status = current.cloned().unwrap_or_default();

        if status.failure_reason.is_some() {
            if status.observed_generation == generation {
                debug!(
                    "KairosConfig {} has a terminal failure for generation {:?}, waiting for a spec change",
                    key, generation
                );
                return Ok(ReconcileOutcome::Done);
            }
            info!("KairosConfig {} spec changed, clearing previous failure", key);
            status.failure_reason = None;
            status.failure_message = None;
        }

        if status.ready && status.data_secret_name.is_some() && status.observed_generation == generation {
            debug!("KairosConfig {} bootstrap data is up to date", key);
            return Ok(ReconcileOutcome::Done);
        }

        let Some(machine_name) = owner_machine_name(&config.metadata) else {
            debug!("KairosConfig {} has no owner Machine yet", key);
            self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
            return Ok(ReconcileOutcome::Done);
        };

        let machine = match self.client.get_machine(&namespace, &machine_name).await {
            Ok(machine) => machine,
            Err(e) if e.is_not_found() => {
                debug!("Owner Machine {}/{} of KairosConfig {} not found yet", namespace, machine_name, key);
                return Ok(ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
            }
            Err(e) => return Err(e.into()),
        };

        let cluster_name = machine.spec.cluster_name.clone();
        let cluster = self.client.get_cluster(&namespace, &cluster_name).await?;
        let cluster_status = cluster.status.clone().unwrap_or_default();
        let role = config.spec.role;

        if !cluster_status.infrastructure_ready {
            info!("KairosConfig {} waiting for cluster {} infrastructure", key, cluster_name);
            set_condition(
                &mut status.conditions,
                Condition::false_condition(
                    BOOTSTRAP_READY_CONDITION,
                    WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
                    ConditionSeverity::Info,
                    "",
                ),
            );
            self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        }

        if role == Role::Worker && !cluster_status.control_plane_ready {
            info!("KairosConfig {} waiting for cluster {} control plane", key, cluster_name);
            set_condition(
                &mut status.conditions,
                Condition::false_condition(
                    BOOTSTRAP_READY_CONDITION,
                    WAITING_FOR_CONTROL_PLANE_INITIALIZATION_REASON,
                    ConditionSeverity::Info,
                    "",
                ),
            );
            self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        }

        let server_address = config
            .spec
            .server_address
            .clone()
            .filter(|address| !address.is_empty())
            .or_else(|| {
                cluster
                    .spec
                    .control_plane_endpoint
                    .as_ref()
                    .and_then(ApiEndpoint::server_address)
            });

        // A worker without an explicit address needs the Cluster endpoint,
        // which the infrastructure provider may not have published yet
        if role == Role::Worker && server_address.is_none() {
            info!("KairosConfig {} waiting for cluster {} control plane endpoint", key, cluster_name);
            set_condition(
                &mut status.conditions,
                Condition::false_condition(
                    BOOTSTRAP_READY_CONDITION,
                    WAITING_FOR_CONTROL_PLANE_ENDPOINT_REASON,
                    ConditionSeverity::Info,
                    "",
                ),
            );
            self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        }

        let document = match generate_cloud_config(
            &config.spec,
            &namespace,
            role,
            server_address.as_deref(),
            self.secrets.as_ref(),
        )
        .await
        {
            Ok(document) => document,
            Err(e) => {
                let class = e.class();
                let message = e.to_string();
                let severity = if class.is_terminal() {
                    ConditionSeverity::Error
                } else {
                    ConditionSeverity::Warning
                };
                set_condition(
                    &mut status.conditions,
                    Condition::false_condition(
                        BOOTSTRAP_READY_CONDITION,
                        BOOTSTRAP_DATA_SECRET_GENERATION_FAILED_REASON,
                        severity,
                        message.clone(),
                    ),
                );
                status.ready = false;

                if class.is_terminal() {
                    warn!("KairosConfig {} failed permanently: {}", key, message);
                    status.failure_reason = Some(class.failure_reason().to_string());
                    status.failure_message = Some(message);
                    status.observed_generation = generation;
                    self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
                    return Ok(ReconcileOutcome::Done);
                }

                self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
                return Err(e.into());
            }
        };

        self.write_bootstrap_data(config, &mut status, &document, &cluster_name).await?;
        self.persist_kairos_config_status(&namespace, &name, current, &status).await?;
        info!("KairosConfig {} bootstrap data stored in Secret {}", key, name);

        Ok(ReconcileOutcome::Done)
    }

    /// Store `document` in the config's data Secret and mark the config ready.
    ///
    /// Only `status` is updated; persisting it is up to the caller.
    pub(crate) async fn write_bootstrap_data(
        &self,
        config: &KairosConfig,
        status: &mut KairosConfigStatus,
        document: &str,
        cluster_name: &str,
    ) -> Result<(), ControllerError> {
        let secret = bootstrap_data_secret(config, document, cluster_name)?;
        self.client.apply_secret(&secret).await?;

        status.ready = true;
        status.data_secret_name = Some(config.name_any());
        status.failure_reason = None;
        status.failure_message = None;
        status.observed_generation = config.metadata.generation;
        set_condition(
            &mut status.conditions,
            Condition::true_condition(DATA_SECRET_AVAILABLE_CONDITION).with_reason(BOOTSTRAP_DATA_SECRET_AVAILABLE_REASON),
        );
        set_condition(
            &mut status.conditions,
            Condition::true_condition(BOOTSTRAP_READY_CONDITION).with_reason(BOOTSTRAP_SUCCEEDED_REASON),
        );
        set_condition(&mut status.conditions, Condition::true_condition(READY_CONDITION));
        Ok(())
    }

    pub(crate) async fn persist_kairos_config_status(
        &self,
        namespace: &str,
        name: &str,
        current: Option<&KairosConfigStatus>,
        desired: &KairosConfigStatus,
    ) -> Result<(), ControllerError> {
        if status_needs_update(current, desired) {
            debug!("Updating KairosConfig {}/{} status", namespace, name);
            self.client.patch_kairos_config_status(namespace, name, desired).await?;
        }
        Ok(())
    }
}
