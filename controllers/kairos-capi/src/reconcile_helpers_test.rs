//! Unit tests for reconcile_helpers module

use super::*;
use crate::test_utils::create_test_control_plane;
use crds::KairosConfigStatus;

fn owner(api_version: &str, kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{}-uid", name),
        ..Default::default()
    }
}

#[test]
fn test_status_needs_update_no_status() {
    let desired = KairosConfigStatus::default();
    assert!(status_needs_update(None, &desired), "Should need update when status is None");
}

#[test]
fn test_status_needs_update_all_match() {
    let status = KairosConfigStatus {
        ready: true,
        data_secret_name: Some("cp-0".to_string()),
        observed_generation: Some(1),
        ..Default::default()
    };
    assert!(!status_needs_update(Some(&status), &status.clone()));
}

#[test]
fn test_status_needs_update_field_changed() {
    let current = KairosConfigStatus::default();
    let desired = KairosConfigStatus {
        ready: true,
        ..Default::default()
    };
    assert!(status_needs_update(Some(&current), &desired));
}

#[test]
fn test_is_paused() {
    let mut meta = ObjectMeta::default();
    assert!(!is_paused(&meta, false));
    assert!(is_paused(&meta, true));

    meta.annotations = Some(BTreeMap::from([(PAUSED_ANNOTATION.to_string(), String::new())]));
    assert!(is_paused(&meta, false));
}

#[test]
fn test_owner_machine_name() {
    let meta = ObjectMeta {
        owner_references: Some(vec![
            owner("controlplane.cluster.x-k8s.io/v1beta2", "KairosControlPlane", "cp"),
            owner("cluster.x-k8s.io/v1beta1", "Machine", "cp-0"),
        ]),
        ..Default::default()
    };
    assert_eq!(owner_machine_name(&meta).as_deref(), Some("cp-0"));
    assert_eq!(owner_machine_name(&ObjectMeta::default()), None);
}

#[test]
fn test_owner_machine_name_ignores_foreign_groups() {
    let meta = ObjectMeta {
        owner_references: Some(vec![owner("example.com/v1", "Machine", "not-capi")]),
        ..Default::default()
    };
    assert_eq!(owner_machine_name(&meta), None);
}

#[test]
fn test_cluster_name_prefers_label() {
    let meta = ObjectMeta {
        labels: Some(BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), "from-label".to_string())])),
        owner_references: Some(vec![owner("cluster.x-k8s.io/v1beta1", "Cluster", "from-owner")]),
        ..Default::default()
    };
    assert_eq!(cluster_name_for(&meta).as_deref(), Some("from-label"));
}

#[test]
fn test_cluster_name_from_owner() {
    let meta = ObjectMeta {
        owner_references: Some(vec![owner("cluster.x-k8s.io/v1beta1", "Cluster", "from-owner")]),
        ..Default::default()
    };
    assert_eq!(cluster_name_for(&meta).as_deref(), Some("from-owner"));
    assert_eq!(cluster_name_for(&ObjectMeta::default()), None);
}

#[test]
fn test_slot_naming() {
    assert_eq!(slot_name("demo-cp", 0), "demo-cp-0");
    assert_eq!(slot_name("demo-cp", 2), "demo-cp-2");
}

#[test]
fn test_control_plane_labels() {
    let labels = control_plane_labels("demo", "demo-cp");
    assert_eq!(labels.get(CLUSTER_NAME_LABEL).map(String::as_str), Some("demo"));
    assert_eq!(labels.get(CONTROL_PLANE_LABEL).map(String::as_str), Some(""));
    assert_eq!(labels.get(CONTROL_PLANE_NAME_LABEL).map(String::as_str), Some("demo-cp"));
    assert_eq!(
        selector_string(&control_plane_selector("demo-cp")),
        "cluster.x-k8s.io/control-plane-name=demo-cp"
    );
}

#[test]
fn test_controller_owner_ref_requires_uid() {
    let kcp = create_test_control_plane("demo-cp", "default", "demo", 1);
    let owner = controller_owner_ref(&kcp).unwrap();
    assert_eq!(owner.kind, "KairosControlPlane");
    assert_eq!(owner.controller, Some(true));

    let mut without_uid = kcp;
    without_uid.metadata.uid = None;
    assert!(matches!(
        controller_owner_ref(&without_uid),
        Err(ControllerError::InvalidResource(_))
    ));
}
