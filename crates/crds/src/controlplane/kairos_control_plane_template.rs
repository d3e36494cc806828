//! KairosControlPlaneTemplate CRD
//!
//! ClusterClass template for KairosControlPlane. Replicas and version come
//! from the cluster topology, so they are not part of the template.

use crate::controlplane::kairos_control_plane::KairosControlPlaneMachineTemplate;
use crate::references::LocalTemplateReference;
use crate::template::TemplateMetadata;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "controlplane.cluster.x-k8s.io",
    version = "v1beta2",
    kind = "KairosControlPlaneTemplate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KairosControlPlaneTemplateSpec {
    pub template: KairosControlPlaneTemplateResource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KairosControlPlaneTemplateResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,

    pub spec: KairosControlPlaneTemplateResourceSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KairosControlPlaneTemplateResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_template: Option<KairosControlPlaneMachineTemplate>,

    pub kairos_config_template: LocalTemplateReference,
}
