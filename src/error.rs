//! Error types for the NFS Server Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A required metadata field was missing on an object
    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether this error is a stale-version conflict. Conflicts self-heal
    /// on redelivery, so they are retried without a user-visible warning.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Kube(e) => is_conflict(e),
            _ => false,
        }
    }
}

/// The API server reports a missing object
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.reason == "NotFound")
}

/// The API server rejected a create because the object exists
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.reason == "AlreadyExists")
}

/// The API server rejected an update because the carried resource version
/// is stale
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.reason == "Conflict")
}
