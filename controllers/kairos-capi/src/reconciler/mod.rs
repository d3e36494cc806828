//! Reconciliation logic for the Kairos Cluster API providers.
//!
//! - `bootstrap`: KairosConfig → cloud-config data Secret
//! - `controlplane`: KairosControlPlane → Machines, KairosConfigs and
//!   infrastructure machines, plus aggregated status

pub mod bootstrap;
pub mod controlplane;

use crate::infrastructure::InfrastructureCloner;
use cluster_client::{ClusterClientTrait, SecretLookup};
use std::sync::Arc;
use std::time::Duration;

/// Requeue delay while waiting on another object (cluster infrastructure,
/// owner Machine, machine readiness)
pub const WAIT_REQUEUE: Duration = Duration::from_secs(30);

/// What the scheduler should do after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the object (or an owned object) changes
    Done,
    /// Check again after the given delay
    RequeueAfter(Duration),
}

/// Reconciles Kairos bootstrap and control plane resources.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClientTrait>,
    pub(crate) secrets: Arc<dyn SecretLookup>,
    pub(crate) infrastructure: InfrastructureCloner,
    /// Upper bound applied to `spec.replicas`
    pub(crate) max_replicas: i32,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("infrastructure", &self.infrastructure)
            .field("max_replicas", &self.max_replicas)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: Arc<dyn ClusterClientTrait>, secrets: Arc<dyn SecretLookup>) -> Self {
        Self {
            client,
            secrets,
            infrastructure: InfrastructureCloner::default(),
            max_replicas: 1,
        }
    }

    #[must_use]
    pub fn with_max_replicas(mut self, max_replicas: i32) -> Self {
        self.max_replicas = max_replicas.max(0);
        self
    }
}
