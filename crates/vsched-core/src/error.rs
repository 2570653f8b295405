//! Error types for vsched core.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing names or loading settings.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid namespaced name: {0}")]
    InvalidName(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("failed to read settings: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}
