//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::Reconciler;
use cluster_client::MockClusterClient;
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reconciler wired to a shared mock for both the store and secret lookups
pub fn create_test_reconciler(client: &MockClusterClient) -> Reconciler {
    Reconciler::new(Arc::new(client.clone()), Arc::new(client.clone()))
}

/// Parse an RFC 3339 timestamp into a Kubernetes `Time`
pub fn timestamp(rfc3339: &str) -> Time {
    serde_json::from_value(serde_json::Value::String(rfc3339.to_string())).expect("valid RFC 3339 timestamp")
}

fn test_meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("{}-uid", name)),
        generation: Some(1),
        ..Default::default()
    }
}

/// Helper to create test Cluster
pub fn create_test_cluster(name: &str, namespace: &str, infrastructure_ready: bool, control_plane_ready: bool) -> Cluster {
    Cluster {
        metadata: test_meta(name, namespace),
        spec: ClusterSpec {
            control_plane_endpoint: Some(ApiEndpoint {
                host: "10.0.0.10".to_string(),
                port: 6443,
            }),
            ..Default::default()
        },
        status: Some(ClusterStatus {
            infrastructure_ready,
            control_plane_ready,
            ..Default::default()
        }),
    }
}

/// Helper to create test KairosConfig owned by a Machine of the same name
pub fn create_test_kairos_config(name: &str, namespace: &str, role: Role) -> KairosConfig {
    let mut config = KairosConfig::new(
        name,
        KairosConfigSpec {
            role,
            kubernetes_version: "v1.30.0+k0s.0".to_string(),
            ..Default::default()
        },
    );
    config.metadata = ObjectMeta {
        owner_references: Some(vec![OwnerReference {
            api_version: CLUSTER_API_VERSION.to_string(),
            kind: "Machine".to_string(),
            name: name.to_string(),
            uid: format!("{}-machine-uid", name),
            controller: Some(true),
            ..Default::default()
        }]),
        ..test_meta(name, namespace)
    };
    config
}

/// Helper to create test Machine belonging to a control plane
pub fn create_test_machine(name: &str, namespace: &str, cluster_name: &str, control_plane_name: &str) -> Machine {
    let mut machine = Machine::new(
        name,
        MachineSpec {
            cluster_name: cluster_name.to_string(),
            bootstrap: MachineBootstrap {
                config_ref: None,
                data_secret_name: Some(name.to_string()),
            },
            infrastructure_ref: ObjectReference::new(
                "infrastructure.cluster.x-k8s.io/v1beta1",
                "DockerMachine",
                name,
            ),
            version: Some("v1.30.0+k0s.0".to_string()),
            provider_id: None,
        },
    );
    machine.metadata = ObjectMeta {
        labels: Some(BTreeMap::from([
            (CLUSTER_NAME_LABEL.to_string(), cluster_name.to_string()),
            (CONTROL_PLANE_LABEL.to_string(), String::new()),
            (CONTROL_PLANE_NAME_LABEL.to_string(), control_plane_name.to_string()),
        ])),
        creation_timestamp: Some(timestamp("2024-01-01T00:00:00Z")),
        ..test_meta(name, namespace)
    };
    machine
}

/// Mark a test Machine as provisioned and infrastructure-ready
pub fn make_machine_ready(mut machine: Machine) -> Machine {
    machine.spec.provider_id = Some(format!("docker:///{}", machine.metadata.name.as_deref().unwrap_or_default()));
    machine.status = Some(MachineStatus {
        infrastructure_ready: true,
        bootstrap_ready: true,
        phase: Some("Running".to_string()),
        ..Default::default()
    });
    machine
}

/// Helper to create test KairosControlPlane owned by a Cluster
pub fn create_test_control_plane(name: &str, namespace: &str, cluster_name: &str, replicas: i32) -> KairosControlPlane {
    let mut kcp = KairosControlPlane::new(
        name,
        KairosControlPlaneSpec {
            replicas: Some(replicas),
            version: "v1.30.0+k0s.0".to_string(),
            machine_template: KairosControlPlaneMachineTemplate {
                metadata: None,
                infrastructure_ref: ObjectReference::new(
                    "infrastructure.cluster.x-k8s.io/v1beta1",
                    "DockerMachineTemplate",
                    "cp-docker-template",
                ),
            },
            kairos_config_template: LocalTemplateReference {
                name: "cp-config-template".to_string(),
                namespace: None,
            },
            pause: false,
        },
    );
    kcp.metadata = ObjectMeta {
        owner_references: Some(vec![OwnerReference {
            api_version: CLUSTER_API_VERSION.to_string(),
            kind: "Cluster".to_string(),
            name: cluster_name.to_string(),
            uid: format!("{}-uid", cluster_name),
            ..Default::default()
        }]),
        ..test_meta(name, namespace)
    };
    kcp
}

/// Helper to create test KairosConfigTemplate for control plane nodes
pub fn create_test_kairos_config_template(name: &str, namespace: &str) -> KairosConfigTemplate {
    let mut template = KairosConfigTemplate::new(
        name,
        KairosConfigTemplateSpec {
            template: KairosConfigTemplateResource {
                metadata: None,
                spec: KairosConfigSpec {
                    role: Role::ControlPlane,
                    ..Default::default()
                },
            },
        },
    );
    template.metadata = test_meta(name, namespace);
    template
}

/// Helper to create an untyped infrastructure template with the given `spec`
pub fn create_test_template_object(
    api_version: &str,
    kind: &str,
    name: &str,
    namespace: &str,
    spec: serde_json::Value,
) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        }),
        metadata: test_meta(name, namespace),
        data: serde_json::json!({ "spec": spec }),
    }
}

/// Mock pre-populated with everything a control plane in `default` needs:
/// the Cluster, the KairosConfigTemplate and a DockerMachineTemplate
pub fn create_control_plane_fixture(cluster_name: &str) -> MockClusterClient {
    let client = MockClusterClient::new();
    client.add_cluster(create_test_cluster(cluster_name, "default", true, false));
    client.add_kairos_config_template(create_test_kairos_config_template("cp-config-template", "default"));
    client.add_object(create_test_template_object(
        "infrastructure.cluster.x-k8s.io/v1beta1",
        "DockerMachineTemplate",
        "cp-docker-template",
        "default",
        serde_json::json!({ "template": { "spec": { "customImage": "kairos-k0s:latest" } } }),
    ));
    client
}
