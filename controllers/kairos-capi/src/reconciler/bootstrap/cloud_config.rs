//! Kairos cloud-config rendering for k0s nodes
//!
//! The document is built from typed structs and serialized with `serde_yaml`,
//! so user-supplied strings never change the document structure.

use super::token::resolve_worker_token;
use crate::error::BootstrapError;
use cluster_client::SecretLookup;
use crds::{Distribution, KairosConfigSpec, Role};
use serde::Serialize;
use std::collections::BTreeMap;

/// Marker line Kairos looks for at the top of user data
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

/// Hostname expression expanded by Kairos at boot, not by this controller
pub const HOSTNAME_TEMPLATE: &str = "metal-{{ trunc 4 .MachineID }}";

/// Where worker nodes read their join token from
pub const TOKEN_FILE_PATH: &str = "/etc/k0s/token";

/// Manifests in this directory are applied by the k0s controller
pub const K0S_MANIFEST_DIR: &str = "/var/lib/k0s/manifests";

const DEFAULT_USER_NAME: &str = "kairos";
const DEFAULT_USER_PASSWORD: &str = "kairos";
const DEFAULT_USER_GROUP: &str = "admin";

const BOOT_BEFORE_STAGE: &str = "boot.before";
const BOOT_AFTER_STAGE: &str = "boot.after";

#[derive(Debug, Serialize)]
struct CloudConfig {
    hostname: String,
    users: Vec<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k0s: Option<K0sService>,
    #[serde(rename = "k0s-worker", skip_serializing_if = "Option::is_none")]
    k0s_worker: Option<K0sService>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    write_files: Vec<WriteFile>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    stages: BTreeMap<&'static str, Vec<Stage>>,
}

#[derive(Debug, Serialize)]
struct User {
    name: String,
    passwd: String,
    groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ssh_authorized_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct K0sService {
    enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WriteFile {
    path: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

#[derive(Debug, Serialize)]
struct Stage {
    name: String,
    commands: Vec<String>,
}

/// Produce the bootstrap document for a node.
///
/// Only k0s is supported; any other distribution fails before the token
/// Secret is read. Worker nodes need a resolvable token and a server address.
pub async fn generate_cloud_config(
    spec: &KairosConfigSpec,
    namespace: &str,
    role: Role,
    server_address: Option<&str>,
    secrets: &dyn SecretLookup,
) -> Result<String, BootstrapError> {
    if spec.distribution != Distribution::K0s {
        return Err(BootstrapError::UnsupportedDistribution(spec.distribution));
    }

    let token = resolve_worker_token(spec, role, namespace, secrets).await?;
    render_k0s_cloud_config(spec, role, token.as_deref(), server_address)
}

/// Render the k0s cloud-config from an already resolved token
pub fn render_k0s_cloud_config(
    spec: &KairosConfigSpec,
    role: Role,
    token: Option<&str>,
    server_address: Option<&str>,
) -> Result<String, BootstrapError> {
    let mut write_files = Vec::new();

    let (k0s, k0s_worker) = match role {
        Role::ControlPlane => {
            let mut args = Vec::new();
            if spec.single_node {
                args.push("--single".to_string());
            }
            (Some(K0sService { enabled: true, args }), None)
        }
        Role::Worker => {
            let token = token.filter(|t| !t.is_empty()).ok_or(BootstrapError::MissingToken)?;
            server_address
                .filter(|a| !a.is_empty())
                .ok_or(BootstrapError::MissingServerAddress)?;

            write_files.push(WriteFile {
                path: TOKEN_FILE_PATH.to_string(),
                content: token.to_string(),
                permissions: Some("0600".to_string()),
                owner: Some("root:root".to_string()),
            });
            let worker = K0sService {
                enabled: true,
                args: vec![format!("--token-file {}", TOKEN_FILE_PATH)],
            };
            (None, Some(worker))
        }
    };

    write_files.extend(spec.files.iter().map(|file| WriteFile {
        path: file.path.clone(),
        content: file.content.clone(),
        permissions: file.permissions.clone(),
        owner: file.owner.clone(),
    }));
    write_files.extend(spec.manifests.iter().map(|manifest| WriteFile {
        path: format!("{}/{}/{}", K0S_MANIFEST_DIR, manifest.name, manifest.file),
        content: manifest.content.clone(),
        permissions: Some("0644".to_string()),
        owner: None,
    }));

    let mut stages = BTreeMap::new();
    if !spec.pre_commands.is_empty() {
        stages.insert(
            BOOT_BEFORE_STAGE,
            vec![Stage {
                name: "Run pre-boot commands".to_string(),
                commands: spec.pre_commands.clone(),
            }],
        );
    }
    if !spec.post_commands.is_empty() {
        stages.insert(
            BOOT_AFTER_STAGE,
            vec![Stage {
                name: "Run post-boot commands".to_string(),
                commands: spec.post_commands.clone(),
            }],
        );
    }

    let document = CloudConfig {
        hostname: HOSTNAME_TEMPLATE.to_string(),
        users: vec![build_user(spec)],
        k0s,
        k0s_worker,
        write_files,
        stages,
    };

    Ok(format!("{}{}", CLOUD_CONFIG_HEADER, serde_yaml::to_string(&document)?))
}

fn build_user(spec: &KairosConfigSpec) -> User {
    let name = spec
        .user_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_USER_NAME);
    let passwd = spec
        .user_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_USER_PASSWORD);
    let groups = if spec.user_groups.is_empty() {
        vec![DEFAULT_USER_GROUP.to_string()]
    } else {
        spec.user_groups.clone()
    };

    let mut ssh_authorized_keys = Vec::new();
    if let Some(github_user) = spec.github_user.as_deref().filter(|u| !u.is_empty()) {
        ssh_authorized_keys.push(format!("github:{}", github_user));
    }
    if let Some(key) = spec.ssh_public_key.as_deref().filter(|k| !k.is_empty()) {
        ssh_authorized_keys.push(key.to_string());
    }

    User {
        name: name.to_string(),
        passwd: passwd.to_string(),
        groups,
        ssh_authorized_keys,
    }
}
