//! Error types for snapshot building and scale access.

use thiserror::Error;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing pool state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to list vpods: {0}")]
    Lister(#[source] anyhow::Error),

    #[error("failed to get scale of {pool}: {source}")]
    GetScale {
        pool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update scale of {pool} to {replicas}: {source}")]
    UpdateScale {
        pool: String,
        replicas: u32,
        #[source]
        source: anyhow::Error,
    },
}
