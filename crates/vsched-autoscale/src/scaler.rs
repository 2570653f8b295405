//! Pool autoscaler: sizes the pool from vreplica demand.
//!
//! Each cycle takes a fresh `CapacitySnapshot`, may vacate the tail pod
//! through the injected evictor, then resizes the pool through the
//! `ScaleCache`. The decision is computed from the snapshot read before
//! the evictions; their effect shows up once the vpods are rescheduled.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use vsched_core::{CoreResult, NamespacedName, Placement, PoolSettings, ReservationMap, VPod};
use vsched_placement::CompactionPass;
use vsched_state::{
    CapacitySnapshot, PodRef, ScaleCache, ScaleClient, StateAccessor, StateBuilder, VPodLister,
};

use crate::error::{AutoscaleError, AutoscaleResult, EvictionFailure};
use crate::leader::{Bucket, LeaderGate};

/// A pool sizing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Resize the pool to the specified number of pods.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

pub type EvictFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Moves one placement off a pod. The vpod's owner reschedules it.
pub type Evictor = Arc<dyn Fn(PodRef, VPod, Placement) -> EvictFuture + Send + Sync>;

/// Returns the current reservation map.
pub type ReservedFn = Arc<dyn Fn() -> ReservationMap + Send + Sync>;

/// Wrap an async closure as an [`Evictor`].
pub fn evictor<F, Fut>(f: F) -> Evictor
where
    F: Fn(PodRef, VPod, Placement) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |pod: PodRef, vpod: VPod, placement: Placement| -> EvictFuture {
        Box::pin(f(pod, vpod, placement))
    })
}

/// Pods needed to hold `total_expected` vreplicas.
pub fn desired_replicas(total_expected: u64, pod_capacity: u32) -> u32 {
    let pods = total_expected.div_ceil(u64::from(pod_capacity.max(1)));
    u32::try_from(pods).unwrap_or(u32::MAX)
}

/// Decide the next pool size. Growth always applies; shrinking only with
/// `scale_down`.
pub fn decide(
    total_expected: u64,
    pod_capacity: u32,
    current: u32,
    scale_down: bool,
) -> ScaleDecision {
    if pod_capacity == 0 {
        warn!("pod capacity is zero, refusing to size the pool");
        return ScaleDecision::NoChange;
    }

    let target = desired_replicas(total_expected, pod_capacity);
    if target > current || (target < current && scale_down) {
        ScaleDecision::ScaleTo(target)
    } else {
        ScaleDecision::NoChange
    }
}

/// Wiring for an [`Autoscaler`].
#[derive(Clone)]
pub struct AutoscalerConfig {
    pub pool_namespace: String,
    pub pool_name: String,
    /// Virtual replicas per pod.
    pub pod_capacity: u32,
    /// Period of the control loop.
    pub refresh_period: Duration,
    pub vpod_lister: VPodLister,
    pub evictor: Evictor,
    pub reserved: ReservedFn,
}

impl AutoscalerConfig {
    pub fn from_settings(
        settings: &PoolSettings,
        vpod_lister: VPodLister,
        evictor: Evictor,
        reserved: ReservedFn,
    ) -> CoreResult<Self> {
        settings.validate()?;
        Ok(Self {
            pool_namespace: settings.namespace.clone(),
            pool_name: settings.name.clone(),
            pod_capacity: settings.pod_capacity,
            refresh_period: settings.refresh_period()?,
            vpod_lister,
            evictor,
            reserved,
        })
    }
}

/// The pool autoscaler.
///
/// All mutating entry points are no-ops unless this replica is leader.
pub struct Autoscaler {
    pool_name: String,
    pod_capacity: u32,
    refresh_period: Duration,
    evictor: Evictor,
    reserved: ReservedFn,
    state: Arc<dyn StateAccessor>,
    scale_cache: Arc<ScaleCache>,
    leader: LeaderGate,
    /// Held for the duration of a cycle.
    cycle: Mutex<()>,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: Mutex<mpsc::Receiver<()>>,
}

impl Autoscaler {
    /// Create an autoscaler over an existing state accessor and scale cache.
    pub fn new(
        config: AutoscalerConfig,
        state: Arc<dyn StateAccessor>,
        scale_cache: Arc<ScaleCache>,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            pool_name: config.pool_name,
            pod_capacity: config.pod_capacity,
            refresh_period: config.refresh_period,
            evictor: config.evictor,
            reserved: config.reserved,
            state,
            scale_cache,
            leader: LeaderGate::new(),
            cycle: Mutex::new(()),
            trigger_tx,
            trigger_rx: Mutex::new(trigger_rx),
        }
    }

    /// Create an autoscaler that builds its own scale cache and snapshots.
    pub fn with_client(
        config: AutoscalerConfig,
        client: Arc<dyn ScaleClient>,
        scale_cache_refresh_period: Duration,
    ) -> Self {
        let scale_cache = Arc::new(ScaleCache::new(
            client,
            config.pool_namespace.clone(),
            scale_cache_refresh_period,
        ));
        let state = Arc::new(StateBuilder::new(
            config.pool_name.clone(),
            config.vpod_lister.clone(),
            config.pod_capacity,
            scale_cache.clone(),
        ));
        Self::new(config, state, scale_cache)
    }

    pub fn scale_cache(&self) -> &Arc<ScaleCache> {
        &self.scale_cache
    }

    pub fn is_leader(&self) -> bool {
        self.leader.is_leader()
    }

    /// Leadership notification. `_on_change` is accepted for interface
    /// parity; the autoscaler keeps no per-key work to requeue.
    pub fn promote(
        &self,
        bucket: &dyn Bucket,
        _on_change: Option<&(dyn Fn(&NamespacedName) + Sync)>,
    ) {
        self.leader.promote(bucket);
    }

    pub fn demote(&self, bucket: &dyn Bucket) {
        self.leader.demote(bucket);
    }

    /// Ask the running loop for an immediate grow-only cycle.
    ///
    /// Never blocks; if a trigger is already pending this one is dropped.
    pub fn autoscale(&self) {
        if self.trigger_tx.try_send(()).is_err() {
            debug!(pool = %self.pool_name, "autoscale already triggered");
        }
    }

    /// Take a snapshot and apply a sizing decision now.
    pub async fn sync_autoscale(&self, scale_down: bool) -> AutoscaleResult<ScaleDecision> {
        if !self.is_leader() {
            return Ok(ScaleDecision::NoChange);
        }

        let _cycle = self.cycle.lock().await;
        let snapshot = self.snapshot().await?;
        self.apply(&snapshot, scale_down).await
    }

    /// Vacate what fits of the tail pod. Returns the number of evictions.
    pub async fn may_compact(&self, snapshot: &CapacitySnapshot) -> AutoscaleResult<usize> {
        if !self.is_leader() {
            return Ok(0);
        }
        self.compact(snapshot).await
    }

    /// One periodic (`scale_down`) or triggered cycle.
    async fn reconcile(&self, scale_down: bool) -> AutoscaleResult<ScaleDecision> {
        if !self.is_leader() {
            return Ok(ScaleDecision::NoChange);
        }

        let _cycle = self.cycle.lock().await;
        let snapshot = self.snapshot().await?;

        if scale_down && let Err(e) = self.compact(&snapshot).await {
            warn!(pool = %self.pool_name, error = %e, "compaction incomplete");
        }

        self.apply(&snapshot, scale_down).await
    }

    async fn snapshot(&self) -> AutoscaleResult<CapacitySnapshot> {
        let reserved = (self.reserved)();
        let snapshot = self.state.state(&reserved).await.inspect_err(|e| {
            info!(pool = %self.pool_name, error = %e, "failed to refresh scheduler state (will retry)");
        })?;
        Ok(snapshot)
    }

    async fn apply(
        &self,
        snapshot: &CapacitySnapshot,
        scale_down: bool,
    ) -> AutoscaleResult<ScaleDecision> {
        let current = self.scale_cache.get_scale(&self.pool_name).await?;
        let total_expected = snapshot.total_expected();

        debug!(
            pool = %self.pool_name,
            replicas = current,
            total_expected,
            total_pending = snapshot.total_pending(),
            "checking pool capacity"
        );

        let decision = decide(total_expected, self.pod_capacity, current, scale_down);
        if let ScaleDecision::ScaleTo(target) = decision {
            self.scale_cache
                .update_scale(&self.pool_name, target)
                .await
                .inspect_err(|e| {
                    error!(pool = %self.pool_name, target, error = %e, "updating pool size failed");
                })?;
            info!(pool = %self.pool_name, from = current, to = target, "pool resized");
        }

        Ok(decision)
    }

    async fn compact(&self, snapshot: &CapacitySnapshot) -> AutoscaleResult<usize> {
        let Some(mut pass) = CompactionPass::new(snapshot) else {
            return Ok(0);
        };
        let tail = pass.tail().clone();
        let mut evicted = 0;
        let mut failures = Vec::new();

        for (vpod, placement) in pass.candidates().to_vec() {
            let count = placement.vreplicas;
            if !pass.try_reserve(count) {
                debug!(
                    vpod = %vpod.key,
                    pod = %tail.name,
                    vreplicas = count,
                    free = pass.free(),
                    "not enough room below the tail"
                );
                continue;
            }

            let key = vpod.key.clone();
            match (self.evictor)(tail.clone(), vpod, placement).await {
                Ok(()) => {
                    evicted += 1;
                    info!(vpod = %key, pod = %tail.name, vreplicas = count, "evicted tail placement");
                }
                Err(e) => {
                    pass.release(count);
                    warn!(vpod = %key, pod = %tail.name, error = %e, "failed to evict tail placement");
                    failures.push(EvictionFailure {
                        pod: tail.name.clone(),
                        vpod: key,
                        vreplicas: count,
                        source: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(evicted)
        } else {
            Err(AutoscaleError::Eviction(failures))
        }
    }

    /// Run the autoscaler loop until `shutdown` fires.
    ///
    /// Ticks every refresh period with scale-down allowed; a trigger from
    /// [`Autoscaler::autoscale`] runs a grow-only cycle and restarts the
    /// period. Followers keep ticking so they can act as soon as promoted.
    /// The scale cache sweeper runs alongside and stops with the loop.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tokio::join!(
            self.scale_cache.run_sweeper(shutdown.clone()),
            self.control_loop(shutdown),
        );
    }

    async fn control_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            pool = %self.pool_name,
            refresh_period = ?self.refresh_period,
            "autoscaler started"
        );

        let mut trigger = self.trigger_rx.lock().await;
        loop {
            let scale_down = tokio::select! {
                _ = tokio::time::sleep(self.refresh_period) => {
                    debug!(pool = %self.pool_name, is_leader = self.is_leader(), "periodic autoscale");
                    true
                }
                Some(()) = trigger.recv() => {
                    debug!(pool = %self.pool_name, is_leader = self.is_leader(), "triggered autoscale");
                    false
                }
                _ = shutdown.changed() => {
                    info!(pool = %self.pool_name, "autoscaler shutting down");
                    break;
                }
            };

            if let Err(e) = self.reconcile(scale_down).await {
                error!(pool = %self.pool_name, error = %e, "autoscale cycle failed");
            }
        }
    }
}
