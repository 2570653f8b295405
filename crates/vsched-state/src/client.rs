//! Authoritative pool-size API.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use vsched_core::NamespacedName;

/// Reads and writes the replica count of a pool.
///
/// Implemented by whatever owns the pool (an orchestrator's scale
/// subresource, a cloud API). Errors are opaque to the caller.
#[async_trait]
pub trait ScaleClient: Send + Sync {
    /// Current replica count of the pool.
    async fn get_scale(&self, namespace: &str, name: &str) -> anyhow::Result<u32>;

    /// Request `replicas` and return the count the backend accepted.
    async fn update_scale(&self, namespace: &str, name: &str, replicas: u32)
    -> anyhow::Result<u32>;
}

/// Process-local `ScaleClient` for tests and dry runs.
///
/// Counts calls, can be told to fail writes, and wakes one waiter per
/// successful update.
#[derive(Default)]
pub struct InMemoryScaleClient {
    pools: Mutex<HashMap<NamespacedName, u32>>,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_updates: AtomicBool,
    updated: Notify,
}

impl InMemoryScaleClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool with an initial size.
    pub fn with_pool(self, namespace: &str, name: &str, replicas: u32) -> Self {
        self.set_replicas(namespace, name, replicas);
        self
    }

    /// Change a pool's size behind the cache's back.
    pub fn set_replicas(&self, namespace: &str, name: &str, replicas: u32) {
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        pools.insert(NamespacedName::new(namespace, name), replicas);
    }

    pub fn replicas(&self, namespace: &str, name: &str) -> Option<u32> {
        let pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        pools.get(&NamespacedName::new(namespace, name)).copied()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent `update_scale` fail.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Resolves after the next successful update (or immediately if one
    /// already happened and nobody consumed it).
    pub async fn updated(&self) {
        self.updated.notified().await;
    }
}

#[async_trait]
impl ScaleClient for InMemoryScaleClient {
    async fn get_scale(&self, namespace: &str, name: &str) -> anyhow::Result<u32> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.replicas(namespace, name)
            .ok_or_else(|| anyhow!("pool {namespace}/{name} not found"))
    }

    async fn update_scale(
        &self,
        namespace: &str,
        name: &str,
        replicas: u32,
    ) -> anyhow::Result<u32> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("update of {namespace}/{name} rejected"));
        }

        {
            let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
            let current = pools
                .get_mut(&NamespacedName::new(namespace, name))
                .ok_or_else(|| anyhow!("pool {namespace}/{name} not found"))?;
            *current = replicas;
        }
        debug!(%namespace, %name, replicas, "in-memory pool resized");
        self.updated.notify_one();
        Ok(replicas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_and_update_round_trip() {
        let client = InMemoryScaleClient::new().with_pool("ns", "pool", 3);

        assert_eq!(client.get_scale("ns", "pool").await.unwrap(), 3);
        assert_eq!(client.update_scale("ns", "pool", 5).await.unwrap(), 5);
        assert_eq!(client.replicas("ns", "pool"), Some(5));
        assert_eq!(client.get_calls(), 1);
        assert_eq!(client.update_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_pool_is_an_error() {
        let client = InMemoryScaleClient::new();
        assert!(client.get_scale("ns", "missing").await.is_err());
        assert!(client.update_scale("ns", "missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn failed_updates_leave_size_unchanged() {
        let client = InMemoryScaleClient::new().with_pool("ns", "pool", 3);
        client.fail_updates(true);

        assert!(client.update_scale("ns", "pool", 1).await.is_err());
        assert_eq!(client.replicas("ns", "pool"), Some(3));
        assert_eq!(client.update_calls(), 1);
    }

    #[tokio::test]
    async fn updated_resolves_after_write() {
        let client = InMemoryScaleClient::new().with_pool("ns", "pool", 3);
        client.update_scale("ns", "pool", 0).await.unwrap();
        // Permit stored by notify_one.
        client.updated().await;
    }
}
