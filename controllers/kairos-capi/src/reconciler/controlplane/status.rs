//! Control plane status aggregation
//!
//! Derives the KairosControlPlane status from the Machines it owns. Pure
//! functions only; persisting the result is left to the reconciler.

use crds::{
    AVAILABLE_CONDITION, Condition, ConditionSeverity, KairosControlPlaneSpec, KairosControlPlaneStatus, Machine,
    WAITING_FOR_MACHINES_READY_REASON, WAITING_FOR_MACHINES_REASON, set_condition,
};

/// Lifecycle phase of one control plane slot, derived from its Machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// Machine exists, no provider ID yet
    Provisioning,
    /// Provider ID set, infrastructure not ready
    Bootstrapped,
    /// Provider ID set and infrastructure ready
    Ready,
    /// Deletion requested
    Terminating,
}

impl SlotPhase {
    pub fn of(machine: &Machine) -> Self {
        if machine.metadata.deletion_timestamp.is_some() {
            return SlotPhase::Terminating;
        }
        if machine.spec.provider_id.as_deref().is_none_or(str::is_empty) {
            return SlotPhase::Provisioning;
        }
        let infrastructure_ready = machine.status.as_ref().is_some_and(|s| s.infrastructure_ready);
        if infrastructure_ready {
            SlotPhase::Ready
        } else {
            SlotPhase::Bootstrapped
        }
    }
}

/// Whether the Machine counts towards `status.replicas`
pub fn is_active(machine: &Machine) -> bool {
    SlotPhase::of(machine) != SlotPhase::Terminating
}

fn clamp_count(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Compute the control plane status from its Machines.
///
/// `previous` carries the sticky `initialized` flag and the existing
/// conditions (so transition times only move on a status flip). The
/// observed generation is left as it was.
pub fn aggregate_status(
    spec: &KairosControlPlaneSpec,
    previous: Option<&KairosControlPlaneStatus>,
    machines: &[Machine],
    desired: i32,
    selector: &str,
) -> KairosControlPlaneStatus {
    let mut status = previous.cloned().unwrap_or_default();

    let active: Vec<&Machine> = machines.iter().filter(|m| is_active(m)).collect();
    let ready: Vec<&Machine> = active
        .iter()
        .copied()
        .filter(|m| SlotPhase::of(m) == SlotPhase::Ready)
        .collect();
    let updated = ready
        .iter()
        .filter(|m| m.spec.version.as_deref() == Some(spec.version.as_str()))
        .count();

    status.replicas = clamp_count(active.len());
    status.ready_replicas = clamp_count(ready.len());
    status.updated_replicas = clamp_count(updated);
    status.unavailable_replicas = (desired - status.ready_replicas).max(0);
    status.ready = status.ready_replicas >= 1;
    status.initialized = status.initialized || status.ready;
    status.selector = Some(selector.to_string());

    let available = if status.ready {
        Condition::true_condition(AVAILABLE_CONDITION)
    } else if machines.is_empty() {
        Condition::false_condition(
            AVAILABLE_CONDITION,
            WAITING_FOR_MACHINES_REASON,
            ConditionSeverity::Info,
            "no control plane machines exist yet",
        )
    } else {
        Condition::false_condition(
            AVAILABLE_CONDITION,
            WAITING_FOR_MACHINES_READY_REASON,
            ConditionSeverity::Info,
            format!("0 of {} control plane machines are ready", machines.len()),
        )
    };
    set_condition(&mut status.conditions, available);

    status
}
