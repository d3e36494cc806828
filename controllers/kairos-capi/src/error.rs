//! Controller-specific error types.
//!
//! Errors are grouped into classes that decide how a failed reconcile is
//! surfaced: validation and unsupported-capability errors become sticky
//! failures on the KairosConfig, dependency and transient errors are retried
//! with backoff.

use cluster_client::ClusterError;
use crds::Distribution;
use kube::Error as KubeError;
use thiserror::Error;

/// How a failure should be handled by the reconcile loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The spec is invalid; retrying the same generation cannot succeed
    Validation,
    /// A referenced object (secret, template, owner) is missing or not ready yet
    DependencyNotReady,
    /// The spec asks for something this controller does not implement
    Unsupported,
    /// Store or transport failure
    Transient,
}

impl ErrorClass {
    /// Whether failures of this class are recorded as sticky status
    pub fn is_terminal(self) -> bool {
        matches!(self, ErrorClass::Validation | ErrorClass::Unsupported)
    }

    /// `failureReason` value written for terminal failures
    pub fn failure_reason(self) -> &'static str {
        match self {
            ErrorClass::Validation => "InvalidConfiguration",
            ErrorClass::Unsupported => "UnsupportedConfiguration",
            ErrorClass::DependencyNotReady => "DependencyNotReady",
            ErrorClass::Transient => "TransientError",
        }
    }
}

/// Class of a store error
pub fn cluster_error_class(error: &ClusterError) -> ErrorClass {
    match error {
        ClusterError::NotFound(_) => ErrorClass::DependencyNotReady,
        ClusterError::InvalidObject(_) => ErrorClass::Validation,
        _ => ErrorClass::Transient,
    }
}

/// Errors from worker token resolution and cloud-config rendering
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Only k0s can be rendered
    #[error("unsupported distribution: {0} (only k0s is supported)")]
    UnsupportedDistribution(Distribution),

    /// Worker node without a token
    #[error("worker token is required: set workerToken or workerTokenSecretRef")]
    MissingToken,

    /// Worker node without a control plane address
    #[error("server address is required for worker nodes")]
    MissingServerAddress,

    /// Token read from a Secret is not valid UTF-8
    #[error("worker token in Secret {0} is not valid UTF-8")]
    InvalidToken(String),

    /// Reading the token Secret failed
    #[error("failed to read worker token: {0}")]
    SecretLookup(#[source] ClusterError),

    /// YAML rendering failed
    #[error("failed to render cloud-config: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl BootstrapError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BootstrapError::UnsupportedDistribution(_) => ErrorClass::Unsupported,
            BootstrapError::MissingToken
            | BootstrapError::MissingServerAddress
            | BootstrapError::InvalidToken(_)
            | BootstrapError::Render(_) => ErrorClass::Validation,
            BootstrapError::SecretLookup(e) => cluster_error_class(e),
        }
    }
}

/// Errors from cloning an infrastructure machine template
#[derive(Debug, Error)]
pub enum CloneError {
    /// No transform is registered for the template Kind
    #[error("unsupported infrastructure provider: {kind} (Group: {group}, Version: {version}, FullGVK: {gvk})")]
    UnsupportedProvider {
        kind: String,
        group: String,
        version: String,
        gvk: String,
    },

    /// The template could not be fetched
    #[error("failed to get infrastructure template {name}: {source}")]
    TemplateLookup {
        name: String,
        #[source]
        source: ClusterError,
    },

    /// The template does not have the expected shape
    #[error("infrastructure template {name} is invalid: {reason}")]
    InvalidTemplate { name: String, reason: String },
}

impl CloneError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CloneError::UnsupportedProvider { .. } => ErrorClass::Unsupported,
            CloneError::TemplateLookup { source, .. } => cluster_error_class(source),
            CloneError::InvalidTemplate { .. } => ErrorClass::Validation,
        }
    }
}

/// Errors that can occur in the Kairos CAPI Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Store error
    #[error("Cluster client error: {0}")]
    Cluster(#[from] ClusterError),

    /// Bootstrap data could not be generated
    #[error("Bootstrap data generation failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Infrastructure machine could not be cloned
    #[error("Infrastructure clone failed: {0}")]
    Clone(#[from] CloneError),

    /// Resource is missing required metadata
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// One or more control plane slots could not be created
    #[error("Failed to create {failed} of {attempted} control plane machine(s): {message}")]
    SlotsFailed {
        failed: usize,
        attempted: usize,
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Probe server failed
    #[error("Probe server failed: {0}")]
    Probe(String),

    /// Metrics registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ControllerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ControllerError::Cluster(e) => cluster_error_class(e),
            ControllerError::Bootstrap(e) => e.class(),
            ControllerError::Clone(e) => e.class(),
            ControllerError::InvalidResource(_) | ControllerError::InvalidConfig(_) => ErrorClass::Validation,
            ControllerError::Kube(_)
            | ControllerError::SlotsFailed { .. }
            | ControllerError::Watch(_)
            | ControllerError::Probe(_)
            | ControllerError::Metrics(_) => ErrorClass::Transient,
        }
    }
}
