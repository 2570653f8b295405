//! Domain types shared by the snapshot builder, the compactor and the
//! autoscaler.
//!
//! These are read-only views: vpods and their placements are owned by an
//! external store and only ever listed, never written, from here.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of virtual replicas. Always non-negative.
pub type VReplicas = u32;

/// Pod-name → reserved vreplicas for a single vpod.
pub type PodReservations = HashMap<String, VReplicas>;

/// Provisional capacity claims not yet reflected in persisted placements.
pub type ReservationMap = HashMap<NamespacedName, PodReservations>;

// ── Names ─────────────────────────────────────────────────────────

/// A namespace-qualified object name. Serialized as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for NamespacedName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => Err(CoreError::InvalidName(s.to_string())),
        }
    }
}

impl TryFrom<String> for NamespacedName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NamespacedName> for String {
    fn from(value: NamespacedName) -> Self {
        value.to_string()
    }
}

// ── VPod ──────────────────────────────────────────────────────────

/// How many of a vpod's virtual replicas sit on one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub pod_name: String,
    pub vreplicas: VReplicas,
}

impl Placement {
    pub fn new(pod_name: impl Into<String>, vreplicas: VReplicas) -> Self {
        Self {
            pod_name: pod_name.into(),
            vreplicas,
        }
    }
}

/// A unit of demand whose virtual replicas are spread across pods.
///
/// At most one placement per pod; the sum of placed replicas never exceeds
/// `vreplicas` (enforced by the owner, assumed on read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VPod {
    pub key: NamespacedName,
    /// Desired number of virtual replicas.
    pub vreplicas: VReplicas,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

impl VPod {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        vreplicas: VReplicas,
        placements: Vec<Placement>,
    ) -> Self {
        Self {
            key: NamespacedName::new(namespace, name),
            vreplicas,
            placements,
        }
    }

    /// Total replicas currently placed across all pods.
    pub fn placed(&self) -> VReplicas {
        self.placements.iter().map(|p| p.vreplicas).sum()
    }

    /// Desired replicas not yet placed anywhere.
    pub fn pending(&self) -> VReplicas {
        self.vreplicas.saturating_sub(self.placed())
    }

    /// The placement on `pod_name`, if any.
    pub fn placement_on(&self, pod_name: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.pod_name == pod_name)
    }
}

// ── Pod names ─────────────────────────────────────────────────────

/// Name of the pod at `ordinal` in `pool`.
pub fn pod_name(pool: &str, ordinal: u32) -> String {
    format!("{pool}-{ordinal}")
}

/// Parse the ordinal suffix of a pool pod name (`pool-3` → `3`).
pub fn ordinal_from_pod_name(pod_name: &str) -> Option<u32> {
    let (_, suffix) = pod_name.rsplit_once('-')?;
    suffix.parse().ok()
}
