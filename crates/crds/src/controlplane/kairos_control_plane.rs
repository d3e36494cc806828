//! KairosControlPlane CRD
//!
//! Manages the set of control plane Machines for a cluster. Each replica is a
//! Cluster API Machine backed by an infrastructure machine cloned from
//! `machineTemplate.infrastructureRef` and a KairosConfig stamped out of
//! `kairosConfigTemplate`.

use crate::conditions::Condition;
use crate::references::{LocalTemplateReference, ObjectReference};
use crate::template::TemplateMetadata;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1beta2",
    kind = "KairosControlPlane",
    namespaced,
    status = "KairosControlPlaneStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct KairosControlPlaneSpec {
    /// Desired number of control plane machines (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Kubernetes version recorded on each Machine
    pub version: String,

    /// Infrastructure template and metadata for control plane machines
    pub machine_template: KairosControlPlaneMachineTemplate,

    /// KairosConfigTemplate used to bootstrap control plane machines
    pub kairos_config_template: LocalTemplateReference,

    /// Pause reconciliation
    #[serde(default)]
    pub pause: bool,
}

impl KairosControlPlaneSpec {
    /// Desired replica count with the default applied
    pub fn desired_replicas(&self) -> i32 {
        self.replicas.unwrap_or(1).max(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KairosControlPlaneMachineTemplate {
    /// Labels and annotations applied to every created object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,

    /// Infrastructure machine template (e.g., a KubevirtMachineTemplate)
    pub infrastructure_ref: ObjectReference,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KairosControlPlaneStatus {
    /// At least one control plane machine has become ready. Never reset.
    #[serde(default)]
    pub initialized: bool,

    /// The control plane can serve requests
    #[serde(default)]
    pub ready: bool,

    /// Non-terminating machines
    #[serde(default)]
    pub replicas: i32,

    /// Machines whose backing compute reports ready
    #[serde(default)]
    pub ready_replicas: i32,

    /// Ready machines running the desired version
    #[serde(default)]
    pub updated_replicas: i32,

    /// Desired replicas not yet ready
    #[serde(default)]
    pub unavailable_replicas: i32,

    /// Label selector matching the managed machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_sample() {
        let spec: KairosControlPlaneSpec = serde_json::from_value(serde_json::json!({
            "replicas": 1,
            "version": "v1.34.1+k0s.1",
            "machineTemplate": {
                "infrastructureRef": {
                    "apiVersion": "infrastructure.cluster.x-k8s.io/v1alpha1",
                    "kind": "KubevirtMachineTemplate",
                    "name": "kairos-cluster-control-plane",
                    "namespace": "default"
                }
            },
            "kairosConfigTemplate": { "name": "kairos-cluster-control-plane" }
        }))
        .unwrap();

        assert_eq!(spec.desired_replicas(), 1);
        assert_eq!(spec.machine_template.infrastructure_ref.kind, "KubevirtMachineTemplate");
        assert!(!spec.pause);
    }

    #[test]
    fn test_desired_replicas_defaults_and_floors() {
        let mut spec = KairosControlPlaneSpec::default();
        assert_eq!(spec.desired_replicas(), 1);

        spec.replicas = Some(-3);
        assert_eq!(spec.desired_replicas(), 0);
    }
}
