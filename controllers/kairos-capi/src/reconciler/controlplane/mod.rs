//! KairosControlPlane reconciler
//!
//! Keeps `spec.replicas` control plane slots alive for a cluster and reports
//! their aggregate state. Each pass lists the Machines carrying the control
//! plane name label, creates missing slots, removes surplus ones and then
//! recomputes status from a fresh listing.

pub mod machines;
pub mod status;
#[cfg(test)]
mod status_test;

use super::{ReconcileOutcome, Reconciler, WAIT_REQUEUE};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    cluster_name_for, control_plane_selector, is_paused, object_key, resource_namespace, selector_string,
    status_needs_update,
};
use crds::{
    Condition, ConditionSeverity, KairosControlPlane, MACHINE_CREATION_FAILED_REASON, MACHINES_CREATED_CONDITION,
    RESIZED_CONDITION, SCALING_DOWN_REASON, SCALING_UP_REASON, set_condition,
};
use kube::ResourceExt;
use machines::{SlotContext, machines_to_delete, slots_to_create};
use status::aggregate_status;
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Reconcile a single KairosControlPlane
    pub async fn reconcile_kairos_control_plane(
        &self,
        kcp: &KairosControlPlane,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let key = object_key(kcp);
        let namespace = resource_namespace(kcp)?;
        let name = kcp.name_any();

        if is_paused(&kcp.metadata, kcp.spec.pause) {
            debug!("KairosControlPlane {} is paused, skipping", key);
            return Ok(ReconcileOutcome::Done);
        }

        let selector = control_plane_selector(&name);

        if kcp.metadata.deletion_timestamp.is_some() {
            let machines = self.client.list_machines(&namespace, &selector).await?;
            let names: Vec<String> = machines.iter().map(ResourceExt::name_any).collect();
            info!("KairosControlPlane {} is being deleted, removing {} Machine(s)", key, names.len());
            self.delete_machines(&namespace, &names).await?;
            return Ok(ReconcileOutcome::Done);
        }

        let Some(cluster_name) = cluster_name_for(&kcp.metadata) else {
            debug!("KairosControlPlane {} is not linked to a Cluster yet", key);
            return Ok(ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        };

        let requested = kcp.spec.desired_replicas();
        let desired = requested.min(self.max_replicas);
        if desired < requested {
            warn!(
                "KairosControlPlane {} requests {} replicas, limiting to {}",
                key, requested, self.max_replicas
            );
        }
        let desired_count = usize::try_from(desired).unwrap_or_default();

        let current = kcp.status.as_ref();
        let initialized = current.is_some_and(|s| s.initialized);
        let machines = self.client.list_machines(&namespace, &selector).await?;

        // Scale up
        let to_create = slots_to_create(&name, &machines, desired_count);
        let mut failures = Vec::new();
        let mut template_error = None;
        if !to_create.is_empty() {
            let template_ref = &kcp.spec.kairos_config_template;
            let template_namespace = template_ref.namespace.as_deref().unwrap_or(&namespace);
            match self
                .client
                .get_kairos_config_template(template_namespace, &template_ref.name)
                .await
            {
                Ok(template) => {
                    let ctx = SlotContext {
                        kcp,
                        namespace: &namespace,
                        cluster_name: &cluster_name,
                        template: &template,
                        desired,
                    };
                    for index in &to_create {
                        if let Err(e) = self.create_slot(&ctx, *index).await {
                            error!("Failed to create slot {} of KairosControlPlane {}: {}", index, key, e);
                            failures.push(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to read KairosConfigTemplate {}/{} for KairosControlPlane {}: {}",
                        template_namespace, template_ref.name, key, e
                    );
                    failures.push(format!(
                        "KairosConfigTemplate {}/{}: {}",
                        template_namespace, template_ref.name, e
                    ));
                    template_error = Some(ControllerError::from(e));
                }
            }
        }

        // Scale down
        let to_delete = machines_to_delete(&machines, desired_count, initialized);
        self.delete_machines(&namespace, &to_delete).await?;

        // Status
        let machines = self.client.list_machines(&namespace, &selector).await?;
        let mut status = aggregate_status(&kcp.spec, current, &machines, desired, &selector_string(&selector));

        if failures.is_empty() {
            set_condition(&mut status.conditions, Condition::true_condition(MACHINES_CREATED_CONDITION));
        } else {
            set_condition(
                &mut status.conditions,
                Condition::false_condition(
                    MACHINES_CREATED_CONDITION,
                    MACHINE_CREATION_FAILED_REASON,
                    ConditionSeverity::Error,
                    failures.join("; "),
                ),
            );
        }

        let resized = if status.replicas < desired {
            Condition::false_condition(
                RESIZED_CONDITION,
                SCALING_UP_REASON,
                ConditionSeverity::Info,
                format!("scaling up from {} to {} replicas", status.replicas, desired),
            )
        } else if status.replicas > desired {
            Condition::false_condition(
                RESIZED_CONDITION,
                SCALING_DOWN_REASON,
                ConditionSeverity::Info,
                format!("scaling down from {} to {} replicas", status.replicas, desired),
            )
        } else {
            Condition::true_condition(RESIZED_CONDITION)
        };
        set_condition(&mut status.conditions, resized);
        status.observed_generation = kcp.metadata.generation;

        if status_needs_update(current, &status) {
            debug!("Updating KairosControlPlane {} status", key);
            self.client
                .patch_kairos_control_plane_status(&namespace, &name, &status)
                .await?;
        }

        if let Some(e) = template_error {
            return Err(e);
        }

        if !failures.is_empty() {
            return Err(ControllerError::SlotsFailed {
                failed: failures.len(),
                attempted: to_create.len(),
                message: failures.join("; "),
            });
        }

        if status.ready_replicas < desired {
            debug!(
                "KairosControlPlane {} has {}/{} ready replicas, checking again later",
                key, status.ready_replicas, desired
            );
            return Ok(ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        }

        Ok(ReconcileOutcome::Done)
    }
}
