//! vsched-core: shared types for the vsched pool autoscaler.
//!
//! A *pool* is an ordered, resizable group of identical pods addressed by
//! ordinal (`{pool}-0 .. {pool}-{N-1}`). Each pod holds up to `pod_capacity`
//! virtual replicas. Virtual replicas belong to *vpods*; the share of a
//! vpod that lives on a given pod is a [`Placement`].
//!
//! # Contents
//!
//! - **`types`**: `NamespacedName`, `VPod`, `Placement`, `ReservationMap`,
//!   pod-name/ordinal helpers
//! - **`config`**: `PoolSettings` loaded from TOML
//! - **`error`**: `CoreError`

pub mod config;
pub mod error;
pub mod types;

pub use config::{PoolSettings, parse_duration};
pub use error::{CoreError, CoreResult};
pub use types::*;
