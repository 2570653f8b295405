//! vsched-state: the scheduler's view of the pool.
//!
//! Provides the read side the autoscaler works from:
//!
//! - **`client`**: `ScaleClient`, the authoritative pool-size API, plus an
//!   in-memory implementation
//! - **`cache`**: `ScaleCache`, a bounded-staleness cache of the pool size
//! - **`snapshot`**: `CapacitySnapshot`, per-pod free capacity for one cycle
//! - **`builder`**: `StateAccessor` and the `StateBuilder` that assembles
//!   snapshots from the vpod lister, reservations and the scale cache
//!
//! # Architecture
//!
//! ```text
//! StateBuilder
//!   ├── VPodLister     (placements, desired vreplicas)
//!   ├── ReservationMap (in-flight claims, passed per call)
//!   └── ScaleCache ──► ScaleClient (current pool size)
//! ```

pub mod builder;
pub mod cache;
pub mod client;
pub mod error;
pub mod snapshot;

pub use builder::{StateAccessor, StateBuilder, VPodLister};
pub use cache::ScaleCache;
pub use client::{InMemoryScaleClient, ScaleClient};
pub use error::{StateError, StateResult};
pub use snapshot::{CapacitySnapshot, PodRef};
