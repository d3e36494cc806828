//! Control plane slot management
//!
//! A slot is the group of objects backing one control plane replica, all
//! sharing the slot name: the Machine, its KairosConfig and data Secret, and
//! the infrastructure machine. Creates are retried safely since every name
//! is deterministic and `AlreadyExists` is treated as success.

use crate::error::ControllerError;
use crate::infrastructure::MachineIdentity;
use crate::reconcile_helpers::{control_plane_labels, controller_owner_ref, slot_name};
use crate::reconciler::Reconciler;
use crate::reconciler::bootstrap::cloud_config::generate_cloud_config;
use crate::reconciler::controlplane::status::{SlotPhase, is_active};
use crds::{
    KairosConfig, KairosConfigSpec, KairosConfigTemplate, KairosControlPlane, Machine, MachineBootstrap,
    MachineSpec, ObjectReference, Role,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Indices of the slots to create so that `desired` Machines are active.
///
/// Fills the lowest indices whose name is not taken by any Machine,
/// terminating ones included.
pub fn slots_to_create(control_plane_name: &str, machines: &[Machine], desired: usize) -> Vec<usize> {
    let active = machines.iter().filter(|m| is_active(m)).count();
    let missing = desired.saturating_sub(active);
    let taken: HashSet<String> = machines.iter().map(ResourceExt::name_any).collect();

    (0..)
        .filter(|index| !taken.contains(&slot_name(control_plane_name, *index)))
        .take(missing)
        .collect()
}

/// Names of the Machines to delete so that at most `desired` stay active.
///
/// Active Machines are ordered oldest first (name breaks ties) and the first
/// `desired` are retained. The only Ready Machine of an initialized control
/// plane is never selected.
pub fn machines_to_delete(machines: &[Machine], desired: usize, initialized: bool) -> Vec<String> {
    let mut active: Vec<&Machine> = machines.iter().filter(|m| is_active(m)).collect();
    if active.len() <= desired {
        return Vec::new();
    }

    active.sort_by_key(|m| (m.metadata.creation_timestamp.as_ref().map(|t| t.0), m.name_any()));

    let ready_count = active
        .iter()
        .filter(|m| SlotPhase::of(m) == SlotPhase::Ready)
        .count();

    active
        .into_iter()
        .skip(desired)
        .filter(|m| {
            let sole_ready = initialized && ready_count == 1 && SlotPhase::of(m) == SlotPhase::Ready;
            if sole_ready {
                warn!(
                    "Keeping Machine {}: it is the only ready machine of an initialized control plane",
                    m.name_any()
                );
            }
            !sole_ready
        })
        .map(ResourceExt::name_any)
        .collect()
}

/// The KairosConfig spec for a control plane slot, derived from the template
pub fn slot_config_spec(template: &KairosConfigTemplate, kcp: &KairosControlPlane, desired: i32) -> KairosConfigSpec {
    let mut spec = template.spec.template.spec.clone();
    spec.role = Role::ControlPlane;
    if spec.kubernetes_version.is_empty() {
        spec.kubernetes_version.clone_from(&kcp.spec.version);
    }
    if desired == 1 {
        spec.single_node = true;
    }
    spec
}

/// Inputs shared by every slot created in one pass
#[derive(Debug)]
pub struct SlotContext<'a> {
    pub kcp: &'a KairosControlPlane,
    pub namespace: &'a str,
    pub cluster_name: &'a str,
    pub template: &'a KairosConfigTemplate,
    pub desired: i32,
}

impl SlotContext<'_> {
    fn kcp_name(&self) -> String {
        self.kcp.name_any()
    }

    /// Slot labels: control plane labels merged over the template labels
    fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = self
            .kcp
            .spec
            .machine_template
            .metadata
            .as_ref()
            .map(|m| m.labels.clone())
            .unwrap_or_default();
        labels.extend(control_plane_labels(self.cluster_name, &self.kcp_name()));
        labels
    }

    fn annotations(&self) -> BTreeMap<String, String> {
        self.kcp
            .spec
            .machine_template
            .metadata
            .as_ref()
            .map(|m| m.annotations.clone())
            .unwrap_or_default()
    }

    fn metadata(&self, name: &str) -> Result<ObjectMeta, ControllerError> {
        let annotations = self.annotations();
        Ok(ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.to_string()),
            labels: Some(self.labels()),
            annotations: (!annotations.is_empty()).then_some(annotations),
            owner_references: Some(vec![controller_owner_ref(self.kcp)?]),
            ..Default::default()
        })
    }
}

impl Reconciler {
    /// Create every object of one slot, then hand ownership of the
    /// KairosConfig and infrastructure machine to the new Machine.
    pub(crate) async fn create_slot(&self, ctx: &SlotContext<'_>, index: usize) -> Result<(), ControllerError> {
        let name = slot_name(&ctx.kcp_name(), index);
        let ns = ctx.namespace;
        info!("Creating control plane slot {}/{}", ns, name);

        // Render first so an invalid template creates nothing
        let spec = slot_config_spec(ctx.template, ctx.kcp, ctx.desired);
        let document = generate_cloud_config(
            &spec,
            ns,
            Role::ControlPlane,
            spec.server_address.as_deref(),
            self.secrets.as_ref(),
        )
        .await?;

        let identity = MachineIdentity {
            name: name.clone(),
            namespace: ns.to_string(),
            labels: ctx.labels(),
            annotations: ctx.annotations(),
            owner_references: vec![controller_owner_ref(ctx.kcp)?],
        };
        let infra_machine = self
            .infrastructure
            .clone_infrastructure_machine(
                self.client.as_ref(),
                &ctx.kcp.spec.machine_template.infrastructure_ref,
                &identity,
            )
            .await?;

        // KairosConfig
        let mut config = KairosConfig::new(&name, spec);
        config.metadata = ctx.metadata(&name)?;
        let config = match self.client.create_kairos_config(&config).await {
            Ok(created) => created,
            Err(e) if e.is_already_exists() => {
                debug!("KairosConfig {}/{} already exists", ns, name);
                self.client.get_kairos_config(ns, &name).await?
            }
            Err(e) => return Err(e.into()),
        };

        // Data Secret
        let current_status = config.status.clone();
        let mut status = current_status.clone().unwrap_or_default();
        self.write_bootstrap_data(&config, &mut status, &document, ctx.cluster_name)
            .await?;
        self.persist_kairos_config_status(ns, &name, current_status.as_ref(), &status)
            .await?;

        // Infrastructure machine
        let (infra_api_version, infra_kind) = infra_machine
            .types
            .as_ref()
            .map(|t| (t.api_version.clone(), t.kind.clone()))
            .ok_or_else(|| ControllerError::InvalidResource(format!("infrastructure machine {} has no kind", name)))?;
        match self.client.create_object(&infra_machine).await {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => debug!("{} {}/{} already exists", infra_kind, ns, name),
            Err(e) => return Err(e.into()),
        }

        // Machine
        let config_ref = ObjectReference::new(KairosConfig::api_version(&()), KairosConfig::kind(&()), &name);
        let infra_ref = ObjectReference::new(&infra_api_version, &infra_kind, &name);
        let mut machine = Machine::new(
            &name,
            MachineSpec {
                cluster_name: ctx.cluster_name.to_string(),
                bootstrap: MachineBootstrap {
                    config_ref: Some(config_ref.clone()),
                    data_secret_name: Some(name.clone()),
                },
                infrastructure_ref: infra_ref.clone(),
                version: Some(ctx.kcp.spec.version.clone()),
                provider_id: None,
            },
        );
        machine.metadata = ctx.metadata(&name)?;
        let machine = match self.client.create_machine(&machine).await {
            Ok(created) => created,
            Err(e) if e.is_already_exists() => {
                debug!("Machine {}/{} already exists", ns, name);
                self.client.get_machine(ns, &name).await?
            }
            Err(e) => return Err(e.into()),
        };

        // The Machine now owns its bootstrap config and infrastructure
        let machine_owner = controller_owner_ref(&machine)?;
        self.client
            .set_owner_references(ns, &config_ref, vec![machine_owner.clone()])
            .await?;
        self.client
            .set_owner_references(ns, &infra_ref, vec![machine_owner])
            .await?;

        info!("Control plane slot {}/{} created", ns, name);
        Ok(())
    }

    /// Delete Machines owned by the control plane; the Machine's dependents
    /// are garbage collected through their owner references.
    pub(crate) async fn delete_machines(&self, namespace: &str, names: &[String]) -> Result<(), ControllerError> {
        for name in names {
            info!("Deleting control plane Machine {}/{}", namespace, name);
            match self.client.delete_machine(namespace, name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!("Machine {}/{} already gone", namespace, name),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
