//! Tail-pod compaction.
//!
//! Given a snapshot of pool `0..N`, the tail pod is `N-1`. Each placement on
//! it is a candidate for eviction; a candidate is taken only if the free
//! capacity left on ordinals `0..N-1` still covers it, and taking it
//! reserves that capacity for the rest of the pass. Nothing below the tail
//! is ever touched.

use serde::Serialize;
use tracing::debug;

use vsched_core::{Placement, VPod, VReplicas};
use vsched_state::{CapacitySnapshot, PodRef};

/// A placement to vacate from the tail pod.
#[derive(Debug, Clone, Serialize)]
pub struct Eviction {
    pub pod: PodRef,
    pub vpod: VPod,
    pub placement: Placement,
}

/// Running free-capacity tally for one compaction pass.
#[derive(Debug, Clone)]
pub struct CompactionPass {
    tail: PodRef,
    free: u64,
    candidates: Vec<(VPod, Placement)>,
}

impl CompactionPass {
    /// Start a pass over the snapshot's tail pod. `None` for an empty pool.
    pub fn new(snapshot: &CapacitySnapshot) -> Option<Self> {
        let tail_ordinal = snapshot.tail_ordinal()?;
        let tail = snapshot.pod(tail_ordinal);

        let free: u64 = (0..tail_ordinal)
            .map(|o| u64::from(snapshot.free(o)))
            .sum();

        let candidates = snapshot
            .vpods
            .iter()
            .filter_map(|vpod| {
                let placement = vpod.placement_on(&tail.name)?;
                (placement.vreplicas > 0).then(|| (vpod.clone(), placement.clone()))
            })
            .collect();

        Some(Self {
            tail,
            free,
            candidates,
        })
    }

    pub fn tail(&self) -> &PodRef {
        &self.tail
    }

    /// Free capacity still available below the tail.
    pub fn free(&self) -> u64 {
        self.free
    }

    /// Tail placements in vpod listing order.
    pub fn candidates(&self) -> &[(VPod, Placement)] {
        &self.candidates
    }

    /// Reserve `count` replicas of lower-ordinal capacity if it is there.
    pub fn try_reserve(&mut self, count: VReplicas) -> bool {
        let count = u64::from(count);
        if self.free >= count {
            self.free -= count;
            true
        } else {
            false
        }
    }

    /// Return capacity reserved for an eviction that did not happen.
    pub fn release(&mut self, count: VReplicas) {
        self.free += u64::from(count);
    }
}

/// Outcome of a dry-run compaction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompactionPlan {
    pub tail: Option<PodRef>,
    /// Free capacity below the tail before the pass.
    pub free_before: u64,
    /// Free capacity below the tail after the planned evictions.
    pub free_after: u64,
    pub evictions: Vec<Eviction>,
    /// Tail placements that do not fit anywhere below.
    pub retained: Vec<Placement>,
}

impl CompactionPlan {
    pub fn is_empty(&self) -> bool {
        self.evictions.is_empty()
    }
}

/// Plan a compaction pass assuming every eviction succeeds.
pub fn plan_compaction(snapshot: &CapacitySnapshot) -> CompactionPlan {
    let Some(mut pass) = CompactionPass::new(snapshot) else {
        return CompactionPlan::default();
    };

    let mut plan = CompactionPlan {
        tail: Some(pass.tail().clone()),
        free_before: pass.free(),
        ..CompactionPlan::default()
    };

    let candidates = pass.candidates().to_vec();
    for (vpod, placement) in candidates {
        if pass.try_reserve(placement.vreplicas) {
            plan.evictions.push(Eviction {
                pod: pass.tail().clone(),
                vpod,
                placement,
            });
        } else {
            debug!(
                vpod = %vpod.key,
                pod = %placement.pod_name,
                vreplicas = placement.vreplicas,
                free = pass.free(),
                "tail placement does not fit below the tail"
            );
            plan.retained.push(placement);
        }
    }

    plan.free_after = pass.free();
    plan
}
