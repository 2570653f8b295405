//! Capacity snapshot: one cycle's view of demand and per-pod free space.
//!
//! Built fresh for every cycle and never mutated afterwards. Pods are
//! indexed by ordinal; `free_cap` covers at least `0..replicas` and extends
//! past it when placements still sit on pods beyond the current size.

use std::collections::HashMap;

use serde::Serialize;

use vsched_core::{NamespacedName, VPod, VReplicas, pod_name};

/// A pod of the pool, as handed to the eviction callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRef {
    pub name: String,
    pub ordinal: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapacitySnapshot {
    /// Pool identity (pod name prefix).
    pub pool_name: String,
    /// Virtual replicas per pod.
    pub capacity: VReplicas,
    /// Pool size when the snapshot was taken.
    pub replicas: u32,
    /// Free capacity per ordinal.
    pub free_cap: Vec<VReplicas>,
    /// Desired vreplicas per vpod.
    pub expected: HashMap<NamespacedName, VReplicas>,
    /// Desired but unplaced vreplicas per vpod.
    pub pending: HashMap<NamespacedName, VReplicas>,
    /// The vpods the snapshot was computed from.
    #[serde(skip)]
    pub vpods: Vec<VPod>,
}

impl CapacitySnapshot {
    /// Sum of desired vreplicas across every known vpod, placed or not.
    pub fn total_expected(&self) -> u64 {
        self.expected.values().map(|&v| u64::from(v)).sum()
    }

    pub fn total_pending(&self) -> u64 {
        self.pending.values().map(|&v| u64::from(v)).sum()
    }

    /// Free capacity of the pod at `ordinal`. Pods no placement has touched
    /// are fully free.
    pub fn free(&self, ordinal: u32) -> VReplicas {
        self.free_cap
            .get(ordinal as usize)
            .copied()
            .unwrap_or(self.capacity)
    }

    /// Capacity in use on the pod at `ordinal`.
    pub fn used(&self, ordinal: u32) -> VReplicas {
        self.capacity.saturating_sub(self.free(ordinal))
    }

    /// Free capacity summed over the pods of the current pool.
    pub fn free_capacity(&self) -> u64 {
        (0..self.replicas).map(|o| u64::from(self.free(o))).sum()
    }

    /// Highest ordinal of the current pool, `None` when it is empty.
    pub fn tail_ordinal(&self) -> Option<u32> {
        self.replicas.checked_sub(1)
    }

    pub fn pod(&self, ordinal: u32) -> PodRef {
        PodRef {
            name: pod_name(&self.pool_name, ordinal),
            ordinal,
        }
    }
}
