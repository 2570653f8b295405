//! vsched placement: defragmentation planning for the pool.
//!
//! The pool only ever shrinks from its highest ordinal, so the only pod
//! worth vacating is the tail. This crate decides which tail placements can
//! be absorbed by spare capacity on lower ordinals. It does NOT evict
//! anything itself (that's `vsched-autoscale`).
//!
//! # Components
//!
//! - **`compactor`**: `CompactionPass` (incremental tally) and
//!   `plan_compaction` (dry-run plan)

pub mod compactor;

pub use compactor::{CompactionPass, CompactionPlan, Eviction, plan_compaction};
