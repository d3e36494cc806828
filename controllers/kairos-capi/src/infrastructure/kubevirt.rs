//! Cluster API Provider KubeVirt (CAPK)
//!
//! A `KubevirtMachineTemplate` nests a full VirtualMachine spec under
//! `spec.template.spec.virtualMachineTemplate.spec`. CAPK attaches its own
//! cloud-init config drive to every VM, so any cloud-init volume and disk
//! carried by the template are removed from the clone.

use super::{INFRASTRUCTURE_GROUP, MachineIdentity, MachineTemplateTransform, new_machine_object, template_group_version, template_name};
use crate::error::CloneError;
use kube::api::DynamicObject;
use serde_json::Value;

/// Version used when the template's apiVersion carries none
pub const KUBEVIRT_DEFAULT_VERSION: &str = "v1alpha1";

const KUBEVIRT_MACHINE_KIND: &str = "KubevirtMachine";
const CLOUD_INIT_VOLUME_KEY: &str = "cloudInitNoCloud";
const CLOUD_INIT_DISK_NAME: &str = "cloudinitdisk";

#[derive(Debug, Clone, Copy, Default)]
pub struct KubevirtTemplateTransform;

impl MachineTemplateTransform for KubevirtTemplateTransform {
    fn transform(&self, template: &DynamicObject, identity: &MachineIdentity) -> Result<DynamicObject, CloneError> {
        let (_, version) = template_group_version(template);
        let version = if version.is_empty() { KUBEVIRT_DEFAULT_VERSION.to_string() } else { version };

        let mut vm_spec = template
            .data
            .pointer("/spec/template/spec/virtualMachineTemplate/spec")
            .filter(|v| v.is_object())
            .cloned()
            .ok_or_else(|| CloneError::InvalidTemplate {
                name: template_name(template),
                reason: "spec.template.spec.virtualMachineTemplate.spec is missing".to_string(),
            })?;

        // VirtualMachine templates keep volumes and devices under
        // `template.spec`; older Kairos templates put them on `template`
        for path in ["/template/spec", "/template"] {
            if let Some(instance_spec) = vm_spec.pointer_mut(path) {
                strip_cloud_init(instance_spec);
            }
        }

        // `running` travels with the rest of the VM spec
        let machine_spec = serde_json::json!({ "virtualMachineTemplate": { "spec": vm_spec } });

        Ok(new_machine_object(
            format!("{}/{}", INFRASTRUCTURE_GROUP, version),
            KUBEVIRT_MACHINE_KIND,
            identity,
            machine_spec,
        ))
    }
}

/// Drop cloud-init volumes and the cloud-init disk from a VM instance spec
fn strip_cloud_init(instance_spec: &mut Value) {
    if let Some(Value::Array(volumes)) = instance_spec.get_mut("volumes") {
        volumes.retain(|volume| volume.get(CLOUD_INIT_VOLUME_KEY).is_none());
    }
    if let Some(Value::Array(disks)) = instance_spec.pointer_mut("/domain/devices/disks") {
        disks.retain(|disk| disk.get("name").and_then(Value::as_str) != Some(CLOUD_INIT_DISK_NAME));
    }
}
