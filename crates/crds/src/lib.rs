//! Kairos CAPI CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Kairos bootstrap and
//! control plane providers, plus the subset of the Cluster API core types
//! (`Machine`, `Cluster`) the controllers read and write.

pub mod bootstrap;
pub mod cluster_api;
pub mod conditions;
pub mod controlplane;
pub mod references;
pub mod template;

pub use bootstrap::*;
pub use cluster_api::*;
pub use conditions::*;
pub use controlplane::*;
pub use references::*;
pub use template::*;

/// Label carrying the owning Cluster API cluster name.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label marking an object as part of a control plane (value is empty).
pub const CONTROL_PLANE_LABEL: &str = "cluster.x-k8s.io/control-plane";

/// Label carrying the name of the owning KairosControlPlane.
pub const CONTROL_PLANE_NAME_LABEL: &str = "cluster.x-k8s.io/control-plane-name";

/// Annotation that pauses reconciliation of the annotated object.
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";
