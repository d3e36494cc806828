//! Bootstrap provider CRDs (`bootstrap.cluster.x-k8s.io`)

pub mod kairos_config;
pub mod kairos_config_template;

pub use kairos_config::*;
pub use kairos_config_template::*;
