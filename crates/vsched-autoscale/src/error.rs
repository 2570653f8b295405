//! Autoscaler error types.

use thiserror::Error;

use vsched_core::NamespacedName;
use vsched_state::StateError;

/// A single placement the evictor refused to move.
#[derive(Debug)]
pub struct EvictionFailure {
    pub pod: String,
    pub vpod: NamespacedName,
    pub vreplicas: u32,
    pub source: anyhow::Error,
}

/// Errors surfaced by one autoscale cycle. None of them outlive the cycle.
#[derive(Debug, Error)]
pub enum AutoscaleError {
    /// Snapshot or pool-size read/write failed.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Some tail evictions failed; the others went through.
    #[error("{} eviction(s) from the tail pod failed", .0.len())]
    Eviction(Vec<EvictionFailure>),
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
