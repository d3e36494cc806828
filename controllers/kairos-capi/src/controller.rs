//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the reconciler to
//! the cluster and runs the watchers for the two Kairos providers:
//! - KairosConfig: bootstrap provider, renders cloud-config data Secrets
//! - KairosControlPlane: control plane provider, manages control plane Machines
//!
//! The probe and metrics server runs next to the watchers.

use crate::backoff::BackoffTable;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics, ProbeState};
use crate::reconciler::Reconciler;
use crate::watcher::{WatchContext, Watcher};
use cluster_client::{ClusterClient, ClusterClientTrait};
use crds::{KairosConfig, KairosControlPlane, Machine};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for the Kairos bootstrap and control plane providers.
#[derive(Debug)]
pub struct Controller {
    kairos_config_watcher: JoinHandle<Result<(), ControllerError>>,
    kairos_control_plane_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

/// Namespaced API when a watch namespace is configured, cluster-wide otherwise
fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Reconciler using one cluster client for object access and secret reads
fn build_reconciler(kube_client: Client, max_replicas: i32) -> Reconciler {
    let cluster_client = Arc::new(ClusterClient::new(kube_client));
    let store: Arc<dyn ClusterClientTrait> = cluster_client.clone();
    Reconciler::new(store, cluster_client).with_max_replicas(max_replicas)
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Kairos CAPI Controller");

        let kube_client = Client::try_default().await?;

        let reconciler = build_reconciler(kube_client.clone(), config.max_control_plane_replicas);

        let namespace = config.namespace.as_deref();
        let kairos_config_api: Api<KairosConfig> = api(&kube_client, namespace);
        let kairos_control_plane_api: Api<KairosControlPlane> = api(&kube_client, namespace);
        let machine_api: Api<Machine> = api(&kube_client, namespace);

        let metrics = Arc::new(Metrics::new()?);
        let probe_state = ProbeState::new(Arc::clone(&metrics));

        let ctx = Arc::new(WatchContext {
            reconciler: Arc::new(reconciler),
            backoff: BackoffTable::default(),
            metrics,
        });

        let watcher_instance = Watcher::new(
            ctx,
            kairos_config_api,
            kairos_control_plane_api,
            machine_api,
            config.reconcile_concurrency,
        );

        info!("Starting watchers...");
        let kairos_config_watcher = {
            let watcher = watcher_instance.clone();
            tokio::spawn(async move { watcher.watch_kairos_configs().await })
        };

        let kairos_control_plane_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_kairos_control_planes().await })
        };

        let probe_server = {
            let state = probe_state.clone();
            let addr = config.probe_bind_address;
            tokio::spawn(async move { metrics::serve(addr, state).await })
        };
        probe_state.set_ready();

        Ok(Self {
            kairos_config_watcher,
            kairos_control_plane_watcher,
            probe_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Kairos CAPI Controller running");

        // Wait for any task to exit (they should run forever)
        tokio::select! {
            result = &mut self.kairos_config_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("KairosConfig watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("KairosConfig watcher error: {}", e)))?;
            }
            result = &mut self.kairos_control_plane_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("KairosControlPlane watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("KairosControlPlane watcher error: {}", e)))?;
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Probe(format!("probe server panicked: {}", e)))??;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
            }
        }

        Ok(())
    }
}
