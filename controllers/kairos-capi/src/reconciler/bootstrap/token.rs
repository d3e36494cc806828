//! Worker join token resolution

use crate::error::BootstrapError;
use cluster_client::SecretLookup;
use crds::{KairosConfigSpec, Role};
use tracing::debug;

/// Resolve the k0s join token for a node.
///
/// A `workerTokenSecretRef` always wins over the inline `workerToken`, even when
/// both are set, and a failed Secret read is returned as-is rather than falling
/// back to the inline value. Control plane nodes may have no token at all.
pub async fn resolve_worker_token(
    spec: &KairosConfigSpec,
    role: Role,
    namespace: &str,
    secrets: &dyn SecretLookup,
) -> Result<Option<String>, BootstrapError> {
    if let Some(secret_ref) = &spec.worker_token_secret_ref {
        let secret_namespace = secret_ref.namespace_or(namespace);
        debug!(
            "Reading worker token from Secret {}/{} key {}",
            secret_namespace, secret_ref.name, secret_ref.key
        );
        let bytes = secrets
            .get_secret_value(secret_namespace, &secret_ref.name, &secret_ref.key)
            .await
            .map_err(BootstrapError::SecretLookup)?;
        let token = String::from_utf8(bytes)
            .map_err(|_| BootstrapError::InvalidToken(format!("{}/{}", secret_namespace, secret_ref.name)))?;
        return Ok(Some(token));
    }

    if let Some(token) = spec.worker_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Some(token.to_string()));
    }

    match role {
        Role::Worker => Err(BootstrapError::MissingToken),
        Role::ControlPlane => Ok(None),
    }
}
