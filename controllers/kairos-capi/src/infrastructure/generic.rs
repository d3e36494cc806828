//! Providers whose machine spec is exactly the template's `spec.template.spec`
//! (CAPD, CAPV).

use super::{INFRASTRUCTURE_GROUP, MachineIdentity, MachineTemplateTransform, new_machine_object, template_group_version};
use crate::error::CloneError;
use kube::api::DynamicObject;

/// Version pinned for the generic providers' machine objects
pub const GENERIC_MACHINE_VERSION: &str = "v1beta1";

/// Copies `spec.template.spec` into the machine's `spec`
#[derive(Debug, Clone)]
pub struct GenericTemplateTransform {
    machine_kind: String,
}

impl GenericTemplateTransform {
    pub fn new(machine_kind: impl Into<String>) -> Self {
        Self {
            machine_kind: machine_kind.into(),
        }
    }
}

impl MachineTemplateTransform for GenericTemplateTransform {
    fn transform(&self, template: &DynamicObject, identity: &MachineIdentity) -> Result<DynamicObject, CloneError> {
        let (group, _) = template_group_version(template);
        let group = if group.is_empty() { INFRASTRUCTURE_GROUP.to_string() } else { group };

        let spec = template
            .data
            .pointer("/spec/template/spec")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        Ok(new_machine_object(
            format!("{}/{}", group, GENERIC_MACHINE_VERSION),
            &self.machine_kind,
            identity,
            spec,
        ))
    }
}
