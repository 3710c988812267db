//! Error types for the reconcilers.
//!
//! Defines the error taxonomy with classification for retry behavior. A
//! lookup that finds nothing is not an error; it is the create branch.

use std::time::Duration;
use thiserror::Error;

use crate::client::{CloudError, ResourceKind};

/// Error type for reconcile operations
#[derive(Error, Debug)]
pub enum Error {
    /// Backend call failed
    #[error("{operation}: {source}")]
    Cloud {
        operation: String,
        #[source]
        source: CloudError,
    },

    /// A lookup expected to be unique matched several objects
    #[error("found {count} {kind} resources matching {filter}, expected at most one")]
    Ambiguous {
        kind: ResourceKind,
        filter: String,
        count: usize,
    },

    /// A status field this step depends on has not been recorded yet
    #[error("precondition not met: {0}")]
    PreconditionMissing(String),

    /// Retry budget exhausted before the resource reached the target state
    #[error("{kind} {id} did not become {target} after {attempts} attempts")]
    WaitTimeout {
        kind: ResourceKind,
        id: String,
        target: String,
        attempts: u32,
    },
}

impl Error {
    /// Wrap a backend error with the operation that produced it.
    ///
    /// ```rust,ignore
    /// client.create_network(&opts).await.map_err(Error::cloud("create network"))?;
    /// ```
    pub fn cloud(operation: impl Into<String>) -> impl FnOnce(CloudError) -> Error {
        let operation = operation.into();
        move |source| Error::Cloud { operation, source }
    }

    /// Check if this error came from a backend not-found answer
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Cloud { source, .. } if source.is_not_found())
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Cloud { source, .. } => source.is_transient(),
            Error::WaitTimeout { .. } => true,
            Error::Ambiguous { .. } | Error::PreconditionMissing(_) => false,
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(30)
        } else {
            // Needs an operator or an earlier reconcile step to fix it
            Duration::from_secs(3600)
        }
    }
}

/// Result type alias for reconcile operations
pub type Result<T> = std::result::Result<T, Error>;
