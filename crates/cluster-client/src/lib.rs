//! Cluster Client
//!
//! Store and secret-lookup ports used by the Kairos CAPI reconcilers, with a
//! Kubernetes-backed implementation and an in-memory mock for unit tests.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClient, ClusterClientTrait, SecretLookup};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClusterClient::new(kube::Client::try_default().await?);
//!
//! // Fetch a bootstrap template
//! let template = client.get_kairos_config_template("default", "workers").await?;
//!
//! // Read a join token out of a Secret
//! let token = client.get_secret_value("default", "k0s-join", "token").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Typed access**: Kairos CRDs and the Cluster API `Machine`/`Cluster` types
//! - **Untyped access**: infrastructure objects of arbitrary kinds via `DynamicObject`
//! - **Error mapping**: 404/409 responses surface as `NotFound`/`AlreadyExists`
//! - **Mocking**: `MockClusterClient` behind the `test-util` feature

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ClusterClient;
pub use cluster_trait::{ClusterClientTrait, SecretLookup};
pub use error::ClusterError;
#[cfg(feature = "test-util")]
pub use mock::MockClusterClient;
