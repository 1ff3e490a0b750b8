//! Error types for meshpack-kube

use thiserror::Error;

/// Result type for meshpack-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors from cluster queries and secret resolution
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Cluster could not be reached or queried
    #[error("cluster unavailable: {0}")]
    Unavailable(String),

    /// Referenced secret or key is missing from the install namespace
    #[error("secret '{name}' has no key '{key}' in namespace '{namespace}'")]
    SecretNotFound {
        namespace: String,
        name: String,
        key: String,
    },

    /// A secret source exists but could not be read as text
    #[error("cannot read {reference}: {message}")]
    SecretSourceUnavailable { reference: String, message: String },
}
