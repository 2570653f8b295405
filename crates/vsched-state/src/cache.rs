//! Scale cache: bounded-staleness reads of pool sizes.
//!
//! The control loop may tick far more often than the authoritative store
//! should be queried. `get_scale` serves the cached size until it is older
//! than the refresh period; writes made through `update_scale` invalidate
//! the entry so the next read observes them.
//!
//! A refresh that started before an invalidation must not put its result
//! back: every invalidation bumps a generation, and a refresh only inserts
//! when the generation it observed before fetching is still current.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::ScaleClient;
use crate::error::{StateError, StateResult};

/// A cached pool size.
#[derive(Debug, Clone, Copy)]
struct ScaleEntry {
    replicas: u32,
    refreshed_at: Instant,
}

/// Cache of pool sizes for one namespace, keyed by pool name.
pub struct ScaleCache {
    client: Arc<dyn ScaleClient>,
    namespace: String,
    refresh_period: Duration,
    entries: RwLock<HashMap<String, ScaleEntry>>,
    /// Bumped under the write lock by every invalidation.
    generation: AtomicU64,
}

impl ScaleCache {
    pub fn new(
        client: Arc<dyn ScaleClient>,
        namespace: impl Into<String>,
        refresh_period: Duration,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            refresh_period,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current size of `name`, fetched from the client when missing or stale.
    pub async fn get_scale(&self, name: &str) -> StateResult<u32> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(name)
                && entry.refreshed_at.elapsed() < self.refresh_period
            {
                return Ok(entry.replicas);
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let replicas = self
            .client
            .get_scale(&self.namespace, name)
            .await
            .map_err(|source| StateError::GetScale {
                pool: name.to_string(),
                source,
            })?;

        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(namespace = %self.namespace, pool = %name, replicas, "invalidated during refresh, not caching");
            return Ok(replicas);
        }
        entries.insert(
            name.to_string(),
            ScaleEntry {
                replicas,
                refreshed_at: Instant::now(),
            },
        );
        debug!(namespace = %self.namespace, pool = %name, replicas, "scale cache refreshed");
        Ok(replicas)
    }

    /// The cached size of `name`, stale or not, without asking the client.
    pub async fn cached(&self, name: &str) -> Option<u32> {
        self.entries.read().await.get(name).map(|e| e.replicas)
    }

    /// Write a new size through the client, then drop the cached entry.
    ///
    /// On failure the entry is left as is.
    pub async fn update_scale(&self, name: &str, replicas: u32) -> StateResult<u32> {
        let accepted = self
            .client
            .update_scale(&self.namespace, name, replicas)
            .await
            .map_err(|source| StateError::UpdateScale {
                pool: name.to_string(),
                replicas,
                source,
            })?;
        self.invalidate(name).await;
        Ok(accepted)
    }

    /// Force the next `get_scale` for `name` to hit the client.
    pub async fn invalidate(&self, name: &str) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        if entries.remove(name).is_some() {
            debug!(namespace = %self.namespace, pool = %name, "scale cache invalidated");
        }
    }

    /// Drop every entry older than the refresh period. Returns how many went.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.refreshed_at.elapsed() < self.refresh_period);
        before - entries.len()
    }

    /// Sweep stale entries every refresh period until shutdown.
    pub async fn run_sweeper(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.refresh_period) => {
                    let swept = self.sweep().await;
                    if swept > 0 {
                        debug!(namespace = %self.namespace, swept, "swept stale scale entries");
                    }
                }
                _ = shutdown.changed() => {
                    info!(namespace = %self.namespace, "scale cache sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::client::{InMemoryScaleClient, ScaleClient};

    /// Client whose first read holds its answer until released.
    struct StalledRead {
        inner: InMemoryScaleClient,
        stall: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl StalledRead {
        fn new(inner: InMemoryScaleClient) -> Self {
            Self {
                inner,
                stall: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ScaleClient for StalledRead {
        async fn get_scale(&self, namespace: &str, name: &str) -> anyhow::Result<u32> {
            let replicas = self.inner.get_scale(namespace, name).await?;
            if self.stall.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(replicas)
        }

        async fn update_scale(
            &self,
            namespace: &str,
            name: &str,
            replicas: u32,
        ) -> anyhow::Result<u32> {
            self.inner.update_scale(namespace, name, replicas).await
        }
    }

    fn cache_with(client: &Arc<InMemoryScaleClient>, period: Duration) -> ScaleCache {
        ScaleCache::new(client.clone(), "test-ns", period)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_served_from_cache() {
        let client = Arc::new(InMemoryScaleClient::new().with_pool("test-ns", "pool", 3));
        let cache = cache_with(&client, Duration::from_secs(300));

        assert_eq!(cache.get_scale("pool").await.unwrap(), 3);
        client.set_replicas("test-ns", "pool", 7);
        assert_eq!(cache.get_scale("pool").await.unwrap(), 3);
        assert_eq!(client.get_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_refetched() {
        let client = Arc::new(InMemoryScaleClient::new().with_pool("test-ns", "pool", 3));
        let cache = cache_with(&client, Duration::from_secs(10));

        cache.get_scale("pool").await.unwrap();
        client.set_replicas("test-ns", "pool", 7);
        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.get_scale("pool").await.unwrap(), 7);
        assert_eq!(client.get_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn update_invalidates_entry() {
        let client = Arc::new(InMemoryScaleClient::new().with_pool("test-ns", "pool", 3));
        let cache = cache_with(&client, Duration::from_secs(300));

        cache.get_scale("pool").await.unwrap();
        assert_eq!(cache.update_scale("pool", 5).await.unwrap(), 5);
        assert_eq!(cache.get_scale("pool").await.unwrap(), 5);
        assert_eq!(client.get_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_update_keeps_entry() {
        let client = Arc::new(InMemoryScaleClient::new().with_pool("test-ns", "pool", 3));
        let cache = cache_with(&client, Duration::from_secs(300));

        cache.get_scale("pool").await.unwrap();
        client.fail_updates(true);

        let err = cache.update_scale("pool", 1).await.unwrap_err();
        assert!(matches!(err, StateError::UpdateScale { replicas: 1, .. }));
        assert_eq!(cache.get_scale("pool").await.unwrap(), 3);
        assert_eq!(client.get_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn get_error_is_not_cached() {
        let client = Arc::new(InMemoryScaleClient::new());
        let cache = cache_with(&client, Duration::from_secs(300));

        assert!(matches!(
            cache.get_scale("pool").await,
            Err(StateError::GetScale { .. })
        ));
        client.set_replicas("test-ns", "pool", 2);
        assert_eq!(cache.get_scale("pool").await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_stale_entries() {
        let client = Arc::new(
            InMemoryScaleClient::new()
                .with_pool("test-ns", "a", 1)
                .with_pool("test-ns", "b", 2),
        );
        let cache = cache_with(&client, Duration::from_secs(10));

        cache.get_scale("a").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.get_scale("b").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.cached("a").await, None);
        assert_eq!(cache.get_scale("b").await.unwrap(), 2);
        assert_eq!(client.get_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_shutdown() {
        let client = Arc::new(InMemoryScaleClient::new().with_pool("test-ns", "pool", 1));
        let cache = Arc::new(cache_with(&client, Duration::from_secs(1)));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn({
            let cache = cache.clone();
            async move { cache.run_sweeper(rx).await }
        });
        tokio::time::advance(Duration::from_secs(3)).await;
        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn read_overlapping_own_write_is_not_cached() {
        let client = Arc::new(StalledRead::new(
            InMemoryScaleClient::new().with_pool("test-ns", "pool", 3),
        ));
        let cache = Arc::new(ScaleCache::new(client.clone(), "test-ns", Duration::from_secs(300)));

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_scale("pool").await }
        });
        client.entered.notified().await;

        // The read already holds the old size when our write lands.
        assert_eq!(cache.update_scale("pool", 5).await.unwrap(), 5);
        client.release.notify_one();
        assert_eq!(reader.await.unwrap().unwrap(), 3);

        assert_eq!(cache.get_scale("pool").await.unwrap(), 5);
        assert_eq!(client.inner.get_calls(), 2);
    }
}
