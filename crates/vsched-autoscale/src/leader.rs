//! Leader gate.
//!
//! Leadership is decided elsewhere; this module only tracks the outcome.
//! The election substrate partitions keys into buckets and tells each
//! replica which buckets it gained or lost. The autoscaler is leader while
//! it owns the bucket holding the well-known ephemeral key.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use vsched_core::NamespacedName;

pub const EPHEMERAL_LEADER_NAMESPACE: &str = "knative-eventing";
pub const EPHEMERAL_LEADER_NAME: &str = "autoscaler-ephemeral";

/// The singleton key whose owner runs the autoscaler.
pub fn ephemeral_leader_key() -> NamespacedName {
    NamespacedName::new(EPHEMERAL_LEADER_NAMESPACE, EPHEMERAL_LEADER_NAME)
}

/// A partition of the key space handed out by leader election.
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;
    fn has(&self, key: &NamespacedName) -> bool;
}

/// The bucket that owns every key (single-replica deployments, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct UniversalBucket;

impl Bucket for UniversalBucket {
    fn name(&self) -> &str {
        "universal"
    }

    fn has(&self, _key: &NamespacedName) -> bool {
        true
    }
}

/// A bucket owning an explicit set of keys.
#[derive(Debug, Clone, Default)]
pub struct OwnedKeys {
    name: String,
    keys: HashSet<NamespacedName>,
}

impl OwnedKeys {
    pub fn new(name: impl Into<String>, keys: impl IntoIterator<Item = NamespacedName>) -> Self {
        Self {
            name: name.into(),
            keys: keys.into_iter().collect(),
        }
    }
}

impl Bucket for OwnedKeys {
    fn name(&self) -> &str {
        &self.name
    }

    fn has(&self, key: &NamespacedName) -> bool {
        self.keys.contains(key)
    }
}

/// Atomic leader flag. Starts as follower.
#[derive(Debug, Default)]
pub struct LeaderGate {
    is_leader: AtomicBool,
}

impl LeaderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// Leader iff the promoted bucket holds the ephemeral key.
    pub fn promote(&self, bucket: &dyn Bucket) {
        let leader = bucket.has(&ephemeral_leader_key());
        let was = self.is_leader.swap(leader, Ordering::SeqCst);
        if leader != was {
            info!(bucket = %bucket.name(), leader, "autoscaler leadership changed");
        }
    }

    pub fn demote(&self, bucket: &dyn Bucket) {
        if self.is_leader.swap(false, Ordering::SeqCst) {
            info!(bucket = %bucket.name(), "autoscaler demoted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_key_is_stable() {
        // Shared by every replica; changing it splits leadership.
        let key = ephemeral_leader_key();
        assert_eq!(key.namespace, "knative-eventing");
        assert_eq!(key.name, "autoscaler-ephemeral");
    }

    #[test]
    fn starts_as_follower() {
        assert!(!LeaderGate::new().is_leader());
    }

    #[test]
    fn universal_promotion_and_demotion() {
        let gate = LeaderGate::new();
        gate.promote(&UniversalBucket);
        assert!(gate.is_leader());
        gate.demote(&UniversalBucket);
        assert!(!gate.is_leader());
    }

    #[test]
    fn promotion_without_key_is_follower() {
        let gate = LeaderGate::new();
        gate.promote(&UniversalBucket);

        let other = OwnedKeys::new("bucket-1", [NamespacedName::new("ns", "something-else")]);
        gate.promote(&other);
        assert!(!gate.is_leader());
    }

    #[test]
    fn promotion_with_key_is_leader() {
        let gate = LeaderGate::new();
        gate.promote(&OwnedKeys::new("bucket-0", [ephemeral_leader_key()]));
        assert!(gate.is_leader());
    }
}
