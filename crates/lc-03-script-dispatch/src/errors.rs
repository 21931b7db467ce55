//! # Error Types

use lc_01_versioned_store::StoreError;
use thiserror::Error;

/// Errors from registry maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The key can never be dispatched to.
    #[error("invalid script key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The environment key is managed through the environment-script calls.
    #[error("'{0}' is reserved for the environment script")]
    ReservedKey(String),

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Dispatch failures that are not expressible as a response.
///
/// Not-found, application errors and execution faults are all ordinary
/// responses; only the store can make a dispatch fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The transaction lost an optimistic-concurrency race. Retry the request.
    #[error("transaction conflict: {0}")]
    Conflict(StoreError),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl DispatchError {
    /// True if re-running the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<StoreError> for DispatchError {
    fn from(error: StoreError) -> Self {
        if error.is_retryable() {
            Self::Conflict(error)
        } else {
            Self::Store(error)
        }
    }
}
