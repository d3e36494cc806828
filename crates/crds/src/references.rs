//! Kubernetes object references used across the Kairos CRDs
//!
//! Cluster API references carry a full `apiVersion` (group and version) so
//! that untyped infrastructure objects can be resolved without a static type.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to an object of any kind, in the Cluster API `ObjectReference` shape
///
/// Used for infrastructure templates, infrastructure machines and bootstrap
/// configs. `namespace` defaults to the namespace of the referencing object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version of the referenced object (e.g., "infrastructure.cluster.x-k8s.io/v1alpha1")
    pub api_version: String,

    /// Kind of the referenced object (e.g., "KubevirtMachineTemplate")
    pub kind: String,

    /// Name of the referenced object
    pub name: String,

    /// Namespace of the referenced object (defaults to the referencing object's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    /// Create a reference in the same namespace as the referencing object
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Create a reference pinned to an explicit namespace
    pub fn with_namespace(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::new(api_version, kind, name)
        }
    }

    /// API group of the referenced object ("" for the core group)
    pub fn group(&self) -> &str {
        split_api_version(&self.api_version).0
    }

    /// API version of the referenced object, without the group
    pub fn version(&self) -> &str {
        split_api_version(&self.api_version).1
    }

    /// Namespace of the referenced object, falling back to `default`
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().filter(|ns| !ns.is_empty()).unwrap_or(default)
    }
}

/// Reference to a single key inside a Kubernetes Secret
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyReference {
    /// Name of the Secret
    pub name: String,

    /// Namespace of the Secret (defaults to the referencing object's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Key within the Secret's data
    pub key: String,
}

impl SecretKeyReference {
    /// Namespace of the Secret, falling back to `default`
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().filter(|ns| !ns.is_empty()).unwrap_or(default)
    }
}

/// Reference to a template of a known kind by name
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalTemplateReference {
    /// Name of the template
    pub name: String,

    /// Namespace of the template (defaults to the referencing object's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Split an `apiVersion` into `(group, version)`
///
/// Core group versions such as `v1` have no group and return `("", "v1")`.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_api_version() {
        assert_eq!(
            split_api_version("infrastructure.cluster.x-k8s.io/v1beta1"),
            ("infrastructure.cluster.x-k8s.io", "v1beta1")
        );
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn test_namespace_fallback() {
        let reference = ObjectReference::new("cluster.x-k8s.io/v1beta1", "Machine", "m-0");
        assert_eq!(reference.namespace_or("capi"), "capi");

        let reference = ObjectReference::with_namespace("cluster.x-k8s.io/v1beta1", "Machine", "m-0", "other");
        assert_eq!(reference.namespace_or("capi"), "other");
        assert_eq!(reference.group(), "cluster.x-k8s.io");
        assert_eq!(reference.version(), "v1beta1");
    }
}
