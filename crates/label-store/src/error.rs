//! Store errors

use thiserror::Error;

/// Errors that can occur when reading or writing through the store.
///
/// Every variant is recoverable from the controller's point of view: the
/// reconciler either treats it as benign or retries the whole pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist (or no longer exists)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write targeted a stale `resourceVersion`
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The API server could not be reached or asked us to back off
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The API server refused the write (validation, admission, RBAC)
    #[error("Rejected by API server: {0}")]
    Rejected(String),

    /// The object handed to the store cannot be written as-is
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the error means the object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Whether the error means another writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) => match response.code {
                404 => StoreError::NotFound(err.to_string()),
                409 => StoreError::Conflict(err.to_string()),
                429 | 500..=599 => StoreError::Unavailable(err.to_string()),
                _ => StoreError::Rejected(err.to_string()),
            },
            kube::Error::SerdeError(_) => StoreError::Serialization(err.to_string()),
            // Transport, TLS, auth discovery and the like
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
