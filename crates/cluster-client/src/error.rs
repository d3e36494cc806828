//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when reading or writing cluster objects
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Object (or Secret key) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create collided with an existing object of the same name
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Write lost an optimistic-concurrency race
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Kubernetes API or transport error
    #[error("Kubernetes error: {0}")]
    Kube(#[source] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing data required for the operation (e.g., no apiVersion)
    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl ClusterError {
    /// Map a kube error, turning 404 and 409 responses into typed variants
    ///
    /// `what` identifies the object in the resulting message (e.g., "Machine default/cp-0").
    pub fn from_kube(error: kube::Error, what: impl Into<String>) -> Self {
        match error {
            kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(what.into()),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                ClusterError::AlreadyExists(what.into())
            }
            kube::Error::Api(ae) if ae.code == 409 => ClusterError::Conflict(what.into()),
            other => ClusterError::Kube(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists(_))
    }
}
