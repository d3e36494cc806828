//! Infrastructure machine cloning
//!
//! Each infrastructure provider ships a `<Provider>MachineTemplate` whose
//! `spec.template.spec` describes a machine. Cloning turns that template into a
//! concrete `<Provider>Machine` object for one control plane slot. Providers are
//! looked up by template Kind in a registry of [`MachineTemplateTransform`]s.

mod generic;
mod kubevirt;

pub use generic::GenericTemplateTransform;
pub use kubevirt::KubevirtTemplateTransform;

use crate::error::CloneError;
use cluster_client::ClusterClientTrait;
use crds::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use kube::core::TypeMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// API group shared by the Cluster API infrastructure providers
pub const INFRASTRUCTURE_GROUP: &str = "infrastructure.cluster.x-k8s.io";

/// Name, namespace and metadata stamped onto a cloned machine
#[derive(Debug, Clone, Default)]
pub struct MachineIdentity {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
}

/// Turns one provider's machine template into a machine object
pub trait MachineTemplateTransform: Send + Sync + std::fmt::Debug {
    /// Build the (unpersisted) machine for `identity` from `template`
    fn transform(&self, template: &DynamicObject, identity: &MachineIdentity) -> Result<DynamicObject, CloneError>;
}

/// Kind-keyed registry of template transforms
#[derive(Debug, Clone)]
pub struct InfrastructureCloner {
    transforms: HashMap<String, Arc<dyn MachineTemplateTransform>>,
}

impl Default for InfrastructureCloner {
    fn default() -> Self {
        let kubevirt: Arc<dyn MachineTemplateTransform> = Arc::new(KubevirtTemplateTransform);
        Self::empty()
            .with(
                "DockerMachineTemplate",
                Arc::new(GenericTemplateTransform::new("DockerMachine")),
            )
            .with(
                "VSphereMachineTemplate",
                Arc::new(GenericTemplateTransform::new("VSphereMachine")),
            )
            .with("KubevirtMachineTemplate", Arc::clone(&kubevirt))
            .with("KubeVirtMachineTemplate", kubevirt)
    }
}

impl InfrastructureCloner {
    /// A registry with no providers
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    fn with(mut self, template_kind: &str, transform: Arc<dyn MachineTemplateTransform>) -> Self {
        self.register(template_kind, transform);
        self
    }

    /// Register (or replace) the transform used for `template_kind`
    pub fn register(&mut self, template_kind: &str, transform: Arc<dyn MachineTemplateTransform>) {
        self.transforms.insert(template_kind.to_string(), transform);
    }

    pub fn supports(&self, template_kind: &str) -> bool {
        self.transforms.contains_key(template_kind)
    }

    /// Fetch the referenced template and build the machine for one slot.
    ///
    /// The returned object is not persisted; the caller creates it.
    pub async fn clone_infrastructure_machine(
        &self,
        client: &dyn ClusterClientTrait,
        template_ref: &ObjectReference,
        identity: &MachineIdentity,
    ) -> Result<DynamicObject, CloneError> {
        info!(
            "Cloning infrastructure machine {}/{} from {} {} ({})",
            identity.namespace, identity.name, template_ref.kind, template_ref.name, template_ref.api_version
        );

        let template = client
            .get_object(&identity.namespace, template_ref)
            .await
            .map_err(|e| CloneError::TemplateLookup {
                name: format!("{} {}", template_ref.kind, template_ref.name),
                source: e,
            })?;

        let transform = self.transforms.get(&template_ref.kind).ok_or_else(|| {
            let (group, version) = (template_ref.group(), template_ref.version());
            CloneError::UnsupportedProvider {
                kind: template_ref.kind.clone(),
                group: group.to_string(),
                version: version.to_string(),
                gvk: format!("{}/{}, Kind={}", group, version, template_ref.kind),
            }
        })?;

        debug!("Using {:?} for {}", transform, template_ref.kind);
        transform.transform(&template, identity)
    }
}

/// A new machine object carrying the slot identity and the given spec
pub(crate) fn new_machine_object(
    api_version: String,
    kind: &str,
    identity: &MachineIdentity,
    spec: serde_json::Value,
) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version,
            kind: kind.to_string(),
        }),
        metadata: ObjectMeta {
            name: Some(identity.name.clone()),
            namespace: Some(identity.namespace.clone()),
            labels: (!identity.labels.is_empty()).then(|| identity.labels.clone()),
            annotations: (!identity.annotations.is_empty()).then(|| identity.annotations.clone()),
            owner_references: (!identity.owner_references.is_empty()).then(|| identity.owner_references.clone()),
            ..Default::default()
        },
        data: serde_json::json!({ "spec": spec }),
    }
}

/// `(group, version)` of a fetched template
pub(crate) fn template_group_version(template: &DynamicObject) -> (String, String) {
    let api_version = template.types.as_ref().map(|t| t.api_version.as_str()).unwrap_or_default();
    let (group, version) = crds::split_api_version(api_version);
    (group.to_string(), version.to_string())
}

pub(crate) fn template_name(template: &DynamicObject) -> String {
    template.metadata.name.clone().unwrap_or_default()
}
