//! Unit tests for control plane status aggregation

#[cfg(test)]
mod tests {
    use super::super::status::*;
    use crate::test_utils::*;
    use crds::{ConditionStatus, KairosControlPlaneStatus, Machine, find_condition};

    const SELECTOR: &str = "cluster.x-k8s.io/control-plane-name=demo-cp";

    fn machine(name: &str) -> Machine {
        create_test_machine(name, "default", "demo", "demo-cp")
    }

    #[test]
    fn test_slot_phase_progression() {
        let provisioning = machine("demo-cp-0");
        assert_eq!(SlotPhase::of(&provisioning), SlotPhase::Provisioning);

        let mut bootstrapped = provisioning.clone();
        bootstrapped.spec.provider_id = Some("docker:///demo-cp-0".to_string());
        assert_eq!(SlotPhase::of(&bootstrapped), SlotPhase::Bootstrapped);

        let ready = make_machine_ready(provisioning.clone());
        assert_eq!(SlotPhase::of(&ready), SlotPhase::Ready);

        let mut terminating = ready;
        terminating.metadata.deletion_timestamp = Some(timestamp("2024-01-02T00:00:00Z"));
        assert_eq!(SlotPhase::of(&terminating), SlotPhase::Terminating);
        assert!(!is_active(&terminating));
    }

    #[test]
    fn test_empty_provider_id_is_provisioning() {
        let mut m = machine("demo-cp-0");
        m.spec.provider_id = Some(String::new());
        assert_eq!(SlotPhase::of(&m), SlotPhase::Provisioning);
    }

    #[test]
    fn test_no_machines_waits_for_machines() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
        let status = aggregate_status(&kcp.spec, None, &[], 1, SELECTOR);

        assert!(!status.initialized);
        assert!(!status.ready);
        assert_eq!(status.replicas, 0);
        assert_eq!(status.unavailable_replicas, 1);
        assert_eq!(status.selector.as_deref(), Some(SELECTOR));

        let available = find_condition(&status.conditions, "Available").unwrap();
        assert_eq!(available.status, ConditionStatus::False);
        assert_eq!(available.reason.as_deref(), Some("WaitingForMachines"));
    }

    #[test]
    fn test_provisioning_machine_waits_for_ready() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
        let status = aggregate_status(&kcp.spec, None, &[machine("demo-cp-0")], 1, SELECTOR);

        assert_eq!(status.replicas, 1);
        assert_eq!(status.ready_replicas, 0);
        let available = find_condition(&status.conditions, "Available").unwrap();
        assert_eq!(available.reason.as_deref(), Some("WaitingForMachinesReady"));
    }

    #[test]
    fn test_ready_machine_initializes() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
        let machines = [make_machine_ready(machine("demo-cp-0"))];
        let status = aggregate_status(&kcp.spec, None, &machines, 1, SELECTOR);

        assert!(status.initialized);
        assert!(status.ready);
        assert_eq!(status.ready_replicas, 1);
        assert_eq!(status.updated_replicas, 1);
        assert_eq!(status.unavailable_replicas, 0);
        let available = find_condition(&status.conditions, "Available").unwrap();
        assert_eq!(available.status, ConditionStatus::True);
    }

    #[test]
    fn test_initialized_is_sticky() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
        let previous = KairosControlPlaneStatus {
            initialized: true,
            ready: true,
            ..Default::default()
        };
        let status = aggregate_status(&kcp.spec, Some(&previous), &[machine("demo-cp-0")], 1, SELECTOR);

        assert!(status.initialized);
        assert!(!status.ready);
    }

    #[test]
    fn test_updated_replicas_requires_matching_version() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 2);
        let current = make_machine_ready(machine("demo-cp-0"));
        let mut stale = make_machine_ready(machine("demo-cp-1"));
        stale.spec.version = Some("v1.29.0+k0s.0".to_string());

        let status = aggregate_status(&kcp.spec, None, &[current, stale], 2, SELECTOR);

        assert_eq!(status.ready_replicas, 2);
        assert_eq!(status.updated_replicas, 1);
    }

    #[test]
    fn test_terminating_machines_not_counted() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
        let mut leaving = make_machine_ready(machine("demo-cp-1"));
        leaving.metadata.deletion_timestamp = Some(timestamp("2024-01-02T00:00:00Z"));

        let status = aggregate_status(&kcp.spec, None, &[machine("demo-cp-0"), leaving], 1, SELECTOR);

        assert_eq!(status.replicas, 1);
        assert_eq!(status.ready_replicas, 0);
    }

    #[test]
    fn test_only_terminating_machines_wait_for_ready() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
        let mut leaving = make_machine_ready(machine("demo-cp-0"));
        leaving.metadata.deletion_timestamp = Some(timestamp("2024-01-02T00:00:00Z"));

        let status = aggregate_status(&kcp.spec, None, &[leaving], 1, SELECTOR);

        assert_eq!(status.replicas, 0);
        assert!(!status.ready);
        let available = find_condition(&status.conditions, "Available").unwrap();
        assert_eq!(available.status, ConditionStatus::False);
        assert_eq!(available.reason.as_deref(), Some("WaitingForMachinesReady"));
        assert_eq!(
            available.message.as_deref(),
            Some("0 of 1 control plane machines are ready")
        );
    }

    #[test]
    fn test_unavailable_never_negative() {
        let kcp = create_test_control_plane("demo-cp", "default", "demo", 0);
        let machines = [make_machine_ready(machine("demo-cp-0"))];
        let status = aggregate_status(&kcp.spec, None, &machines, 0, SELECTOR);

        assert_eq!(status.unavailable_replicas, 0);
    }
}
