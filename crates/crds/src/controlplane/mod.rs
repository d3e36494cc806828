//! Control plane provider CRDs (`controlplane.cluster.x-k8s.io`)

pub mod kairos_control_plane;
pub mod kairos_control_plane_template;

pub use kairos_control_plane::*;
pub use kairos_control_plane_template::*;
