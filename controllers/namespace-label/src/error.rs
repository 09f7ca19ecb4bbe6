//! Controller-specific error types.
//!
//! Store failures are wrapped as-is; everything else the controller can hit on
//! its own is listed here. [`ControllerError::retry`] decides how the
//! scheduler should react to each kind.

use label_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the namespace label controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Read or write against the store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Kubernetes client could not be set up
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The request can never be applied as written
    #[error("Malformed NamespaceLabel: {0}")]
    MalformedRequest(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

/// How a failed pass should be rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Someone else wrote first: redo the pass from a fresh read soon
    Soon,
    /// Transient failure: redo the pass after a growing delay
    Backoff,
    /// Retrying cannot help until the object itself changes
    Never,
}

impl ControllerError {
    /// Retry class for this error.
    pub fn retry(&self) -> Retry {
        match self {
            ControllerError::Store(StoreError::Conflict(_)) => Retry::Soon,
            ControllerError::MalformedRequest(_) | ControllerError::InvalidConfig(_) => Retry::Never,
            _ => Retry::Backoff,
        }
    }
}
