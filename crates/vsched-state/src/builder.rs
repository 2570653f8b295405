//! Snapshot assembly.
//!
//! Per-pod usage for a vpod is the larger of what is placed there and what
//! is reserved there, so in-flight scheduling decisions that have not been
//! persisted yet still count against capacity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use vsched_core::{ReservationMap, VPod, VReplicas, ordinal_from_pod_name};

use crate::cache::ScaleCache;
use crate::error::{StateError, StateResult};
use crate::snapshot::CapacitySnapshot;

/// Lists every known vpod with its current placements.
pub type VPodLister = Arc<dyn Fn() -> anyhow::Result<Vec<VPod>> + Send + Sync>;

/// Produces a fresh capacity snapshot for each cycle.
#[async_trait]
pub trait StateAccessor: Send + Sync {
    async fn state(&self, reserved: &ReservationMap) -> StateResult<CapacitySnapshot>;
}

/// Builds snapshots from the vpod lister and the pool's scale cache.
pub struct StateBuilder {
    pool_name: String,
    capacity: VReplicas,
    vpod_lister: VPodLister,
    scale_cache: Arc<ScaleCache>,
}

impl StateBuilder {
    pub fn new(
        pool_name: impl Into<String>,
        vpod_lister: VPodLister,
        capacity: VReplicas,
        scale_cache: Arc<ScaleCache>,
    ) -> Self {
        Self {
            pool_name: pool_name.into(),
            capacity,
            vpod_lister,
            scale_cache,
        }
    }

    /// Pure part of `state`: account `vpods` and `reserved` against a pool
    /// of `replicas` pods.
    pub fn compute(
        pool_name: &str,
        capacity: VReplicas,
        replicas: u32,
        vpods: Vec<VPod>,
        reserved: &ReservationMap,
    ) -> CapacitySnapshot {
        let mut used: Vec<VReplicas> = vec![0; replicas as usize];
        let mut expected = HashMap::with_capacity(vpods.len());
        let mut pending = HashMap::with_capacity(vpods.len());

        let mut charge = |pod: &str, count: VReplicas| {
            let Some(ordinal) = ordinal_from_pod_name(pod) else {
                warn!(pool = %pool_name, %pod, "ignoring usage on pod without ordinal");
                return;
            };
            let idx = ordinal as usize;
            if idx >= used.len() {
                used.resize(idx + 1, 0);
            }
            used[idx] = used[idx].saturating_add(count);
        };

        for vpod in &vpods {
            expected.insert(vpod.key.clone(), vpod.vreplicas);
            pending.insert(vpod.key.clone(), vpod.pending());

            let mut per_pod: HashMap<&str, VReplicas> = vpod
                .placements
                .iter()
                .map(|p| (p.pod_name.as_str(), p.vreplicas))
                .collect();
            if let Some(claims) = reserved.get(&vpod.key) {
                for (pod, &count) in claims {
                    let slot = per_pod.entry(pod.as_str()).or_insert(0);
                    *slot = (*slot).max(count);
                }
            }
            for (pod, count) in per_pod {
                charge(pod, count);
            }
        }

        // Claims for vpods the lister does not know about yet.
        for (key, claims) in reserved {
            if expected.contains_key(key) {
                continue;
            }
            for (pod, &count) in claims {
                charge(pod, count);
            }
        }

        let free_cap = used.iter().map(|&u| capacity.saturating_sub(u)).collect();

        CapacitySnapshot {
            pool_name: pool_name.to_string(),
            capacity,
            replicas,
            free_cap,
            expected,
            pending,
            vpods,
        }
    }
}

#[async_trait]
impl StateAccessor for StateBuilder {
    async fn state(&self, reserved: &ReservationMap) -> StateResult<CapacitySnapshot> {
        let replicas = self.scale_cache.get_scale(&self.pool_name).await?;
        let vpods = (self.vpod_lister)().map_err(StateError::Lister)?;

        let snapshot = Self::compute(&self.pool_name, self.capacity, replicas, vpods, reserved);
        debug!(
            pool = %self.pool_name,
            replicas,
            total_expected = snapshot.total_expected(),
            free_capacity = snapshot.free_capacity(),
            "capacity snapshot built"
        );
        Ok(snapshot)
    }
}
