//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;

/// Default address for the probe and metrics server
pub const DEFAULT_PROBE_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Runtime configuration for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch (`None` watches all namespaces)
    pub namespace: Option<String>,

    /// Bind address of the `/healthz`, `/readyz` and `/metrics` server
    pub probe_bind_address: SocketAddr,

    /// Upper bound on control plane replicas per KairosControlPlane
    pub max_control_plane_replicas: i32,

    /// Concurrent reconciles per watched kind
    pub reconcile_concurrency: u16,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let probe_bind_address = lookup("PROBE_BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_PROBE_BIND_ADDRESS.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!("PROBE_BIND_ADDRESS: {}", e)))?;

        let max_control_plane_replicas = match lookup("MAX_CONTROL_PLANE_REPLICAS") {
            Some(value) => value
                .parse::<i32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "MAX_CONTROL_PLANE_REPLICAS must be a positive integer, got {:?}",
                        value
                    ))
                })?,
            None => 1,
        };

        let reconcile_concurrency = match lookup("RECONCILE_CONCURRENCY") {
            Some(value) => value
                .parse::<u16>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "RECONCILE_CONCURRENCY must be a positive integer, got {:?}",
                        value
                    ))
                })?,
            None => 3,
        };

        Ok(Self {
            namespace,
            probe_bind_address,
            max_control_plane_replicas,
            reconcile_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.namespace, None);
        assert_eq!(config.probe_bind_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.max_control_plane_replicas, 1);
        assert_eq!(config.reconcile_concurrency, 3);
    }

    #[test]
    fn test_overrides() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("WATCH_NAMESPACE", "capi-system"),
            ("PROBE_BIND_ADDRESS", "127.0.0.1:9090"),
            ("MAX_CONTROL_PLANE_REPLICAS", "3"),
            ("RECONCILE_CONCURRENCY", "5"),
        ]))
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("capi-system"));
        assert_eq!(config.probe_bind_address.port(), 9090);
        assert_eq!(config.max_control_plane_replicas, 3);
        assert_eq!(config.reconcile_concurrency, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&[("MAX_CONTROL_PLANE_REPLICAS", "0")])),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&[("PROBE_BIND_ADDRESS", "not-an-address")])),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
