//! vsched-autoscale: sizes a pool of fixed-capacity pods from vreplica demand.
//!
//! Every cycle reads a `CapacitySnapshot`, optionally vacates the tail pod,
//! and resizes the pool through the `ScaleCache`. Only the leader acts.
//!
//! # Scaling Algorithm
//!
//! ```text
//! demand  = sum(vpod.vreplicas)          // placed or not
//! target  = ceil(demand / pod_capacity)
//!
//! if target > current:
//!     ScaleTo(target)                    // never gated
//!
//! if target < current and scale_down:
//!     ScaleTo(target)
//! ```
//!
//! Periodic ticks run with `scale_down` granted and compact the tail pod
//! first; on-demand calls (`autoscale`, `sync_autoscale(false)`) only grow.

pub mod error;
pub mod leader;
pub mod scaler;

pub use error::{AutoscaleError, AutoscaleResult, EvictionFailure};
pub use leader::{Bucket, LeaderGate, OwnedKeys, UniversalBucket, ephemeral_leader_key};
pub use scaler::{
    Autoscaler, AutoscalerConfig, EvictFuture, Evictor, ReservedFn, ScaleDecision, decide,
    desired_replicas, evictor,
};
