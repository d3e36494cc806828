//! Cluster API core types
//!
//! Minimal typed views of `cluster.x-k8s.io/v1beta1` Machine and Cluster.
//! These CRDs are installed by Cluster API itself; only the fields the Kairos
//! providers read or write are modelled, unknown fields are ignored on read.

use crate::conditions::Condition;
use crate::references::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API version of the Cluster API core types
pub const CLUSTER_API_VERSION: &str = "cluster.x-k8s.io/v1beta1";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Name of the owning Cluster
    pub cluster_name: String,

    pub bootstrap: MachineBootstrap,

    /// Infrastructure machine backing this Machine
    pub infrastructure_ref: ObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Identifier of the backing compute instance, set by the infrastructure provider
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineBootstrap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<NodeReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default)]
    pub bootstrap_ready: bool,

    #[serde(default)]
    pub infrastructure_ready: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeReference {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
}

/// Address of the cluster API server
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub host: String,
    pub port: i32,
}

impl ApiEndpoint {
    /// `https://host:port`, or `None` while the endpoint is not populated
    pub fn server_address(&self) -> Option<String> {
        (!self.host.is_empty() && self.port > 0).then(|| format!("https://{}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub infrastructure_ready: bool,

    #[serde(default)]
    pub control_plane_ready: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_provider_id_wire_name() {
        let spec: MachineSpec = serde_json::from_value(serde_json::json!({
            "clusterName": "kairos-cluster",
            "bootstrap": { "dataSecretName": "cp-0" },
            "infrastructureRef": {
                "apiVersion": "infrastructure.cluster.x-k8s.io/v1alpha1",
                "kind": "KubevirtMachine",
                "name": "cp-0",
                "uid": "ignored"
            },
            "providerID": "kubevirt://cp-0"
        }))
        .unwrap();

        assert_eq!(spec.provider_id.as_deref(), Some("kubevirt://cp-0"));
        assert_eq!(spec.bootstrap.data_secret_name.as_deref(), Some("cp-0"));
    }

    #[test]
    fn test_api_endpoint_server_address() {
        let endpoint = ApiEndpoint { host: "10.0.0.10".to_string(), port: 6443 };
        assert_eq!(endpoint.server_address().as_deref(), Some("https://10.0.0.10:6443"));

        assert!(ApiEndpoint::default().server_address().is_none());
    }
}
