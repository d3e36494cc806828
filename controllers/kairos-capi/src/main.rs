//! Kairos CAPI Controller
//!
//! Cluster API providers for Kairos nodes running k0s:
//! - Bootstrap provider (KairosConfig): renders each node's cloud-config into
//!   a data Secret referenced by its Machine
//! - Control plane provider (KairosControlPlane): creates and removes control
//!   plane Machines together with their bootstrap configs and infrastructure
//!   machines, and reports their aggregate state

mod backoff;
mod config;
mod controller;
mod error;
mod infrastructure;
mod metrics;
mod reconcile_helpers;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // kube uses rustls; pick the ring provider before any client is built
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Kairos CAPI Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Probe address: {}", config.probe_bind_address);
    info!("  Max control plane replicas: {}", config.max_control_plane_replicas);
    info!("  Reconcile concurrency: {}", config.reconcile_concurrency);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
