//! KairosConfigTemplate CRD
//!
//! Template from which per-machine KairosConfigs are stamped out.

use crate::bootstrap::kairos_config::KairosConfigSpec;
use crate::template::TemplateMetadata;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "bootstrap.cluster.x-k8s.io",
    version = "v1beta2",
    kind = "KairosConfigTemplate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KairosConfigTemplateSpec {
    pub template: KairosConfigTemplateResource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KairosConfigTemplateResource {
    /// Metadata applied to generated KairosConfigs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,

    /// Spec copied into generated KairosConfigs
    #[serde(default)]
    pub spec: KairosConfigSpec,
}
