//! KairosConfig CRD
//!
//! Declares how a single node bootstraps: its role in the cluster, the
//! Kubernetes distribution, join credentials and first-boot customisation.
//! The bootstrap provider renders it into a Kairos cloud-config document and
//! stores it in a Secret referenced from `status.dataSecretName`.

use crate::conditions::Condition;
use crate::references::SecretKeyReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "bootstrap.cluster.x-k8s.io",
    version = "v1beta2",
    kind = "KairosConfig",
    namespaced,
    status = "KairosConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct KairosConfigSpec {
    /// Node role
    #[serde(default)]
    pub role: Role,

    /// Kubernetes distribution installed on the node
    #[serde(default)]
    pub distribution: Distribution,

    /// Kubernetes version (e.g., "v1.30.0+k0s.0")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,

    /// Control plane API server address, required for workers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,

    /// Inline worker join token
    #[serde(default, alias = "token", skip_serializing_if = "Option::is_none")]
    pub worker_token: Option<String>,

    /// Secret holding the worker join token (takes precedence over `workerToken`)
    #[serde(default, alias = "tokenSecretRef", skip_serializing_if = "Option::is_none")]
    pub worker_token_secret_ref: Option<SecretKeyReference>,

    /// CA certificate hashes for join verification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ca_cert_hashes: Vec<String>,

    /// Secret holding the cluster CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_secret_ref: Option<SecretKeyReference>,

    /// Run the control plane as a single node (controller and worker)
    #[serde(default)]
    pub single_node: bool,

    /// Login user name (defaults to "kairos")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Login user password (defaults to "kairos")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_password: Option<String>,

    /// Login user groups (defaults to ["admin"])
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_groups: Vec<String>,

    /// GitHub user whose public keys are authorized for SSH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_user: Option<String>,

    /// Raw SSH public key authorized for the login user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,

    /// Commands run before Kubernetes starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_commands: Vec<String>,

    /// Commands run after Kubernetes starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_commands: Vec<String>,

    /// Extra files written on first boot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    /// Manifests dropped into the k0s manifest directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<Manifest>,

    /// Pause reconciliation
    #[serde(default)]
    pub pause: bool,
}

/// Node role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Kubernetes controller node
    ControlPlane,

    /// Kubernetes worker node
    #[default]
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::ControlPlane => write!(f, "control-plane"),
            Role::Worker => write!(f, "worker"),
        }
    }
}

/// Kubernetes distribution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    K0s,
    K3s,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::K0s => write!(f, "k0s"),
            Distribution::K3s => write!(f, "k3s"),
        }
    }
}

/// A file written on first boot
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path on the node
    pub path: String,

    /// File content
    pub content: String,

    /// Octal permissions (e.g., "0644")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,

    /// Owner in "user:group" form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A manifest applied by k0s from `/var/lib/k0s/manifests/<name>/<file>`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Directory name under the manifest root
    pub name: String,

    /// File name inside the directory
    pub file: String,

    /// Manifest content
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KairosConfigStatus {
    /// Bootstrap data has been generated and stored
    #[serde(default)]
    pub ready: bool,

    /// Name of the Secret holding the bootstrap data (key "value")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation of the spec last acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Terminal failure reason, cleared when the spec generation changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Terminal failure details, cleared when the spec generation changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}
