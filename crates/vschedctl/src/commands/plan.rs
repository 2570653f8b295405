//! `vschedctl plan`: one autoscale cycle computed offline.
//!
//! Nothing is evicted and nothing is resized; the report shows the
//! snapshot totals, the sizing decision and, for periodic cycles, the
//! tail evictions the compactor would issue.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vsched_autoscale::{ScaleDecision, decide, desired_replicas};
use vsched_core::{PoolSettings, ReservationMap, VPod};
use vsched_placement::{CompactionPlan, plan_compaction};
use vsched_state::{CapacitySnapshot, StateBuilder};

/// Scheduler state as read from `--state`.
#[derive(Debug, Default, Deserialize)]
pub struct StateFile {
    /// Current pool size.
    pub replicas: u32,
    #[serde(default)]
    pub vpods: Vec<VPod>,
    #[serde(default)]
    pub reserved: ReservationMap,
}

impl StateFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {}", path.display()))
    }
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub pool: String,
    pub replicas: u32,
    pub pod_capacity: u32,
    pub total_expected: u64,
    pub total_pending: u64,
    pub free_capacity: u64,
    pub desired_replicas: u32,
    /// New pool size, absent when the pool stays as it is.
    pub scale_to: Option<u32>,
    /// Only computed for periodic (`--scale-down`) cycles.
    pub compaction: Option<CompactionPlan>,
}

/// Build the report for one cycle over `state`.
pub fn build_report(settings: &PoolSettings, state: StateFile, scale_down: bool) -> PlanReport {
    let snapshot: CapacitySnapshot = StateBuilder::compute(
        &settings.name,
        settings.pod_capacity,
        state.replicas,
        state.vpods,
        &state.reserved,
    );
    let total_expected = snapshot.total_expected();

    let compaction = scale_down.then(|| plan_compaction(&snapshot));
    let scale_to = match decide(total_expected, settings.pod_capacity, state.replicas, scale_down) {
        ScaleDecision::ScaleTo(n) => Some(n),
        ScaleDecision::NoChange => None,
    };
    debug!(pool = %settings.name, total_expected, ?scale_to, "planned cycle");

    PlanReport {
        pool: format!("{}/{}", settings.namespace, settings.name),
        replicas: state.replicas,
        pod_capacity: settings.pod_capacity,
        total_expected,
        total_pending: snapshot.total_pending(),
        free_capacity: snapshot.free_capacity(),
        desired_replicas: desired_replicas(total_expected, settings.pod_capacity),
        scale_to,
        compaction,
    }
}

pub fn format_report(report: &PlanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Pool {} ({} pods x {} vreplicas)\n", report.pool, report.replicas, report.pod_capacity));
    out.push_str(&format!(
        "  demand: {} expected, {} pending, {} free\n",
        report.total_expected, report.total_pending, report.free_capacity
    ));
    match report.scale_to {
        Some(n) => out.push_str(&format!("  resize: {} -> {}\n", report.replicas, n)),
        None => out.push_str(&format!("  resize: none (desired {})\n", report.desired_replicas)),
    }
    if let Some(plan) = &report.compaction {
        match &plan.tail {
            Some(tail) => {
                out.push_str(&format!(
                    "  compaction of {}: {} free below, {} eviction(s)\n",
                    tail.name,
                    plan.free_before,
                    plan.evictions.len()
                ));
                for e in &plan.evictions {
                    out.push_str(&format!("    evict {} ({} vreplicas)\n", e.vpod.key, e.placement.vreplicas));
                }
            }
            None => out.push_str("  compaction: empty pool\n"),
        }
    }
    out
}

pub fn plan(pool: &str, state: &str, scale_down: bool, format: &str) -> Result<()> {
    let settings = PoolSettings::from_file(Path::new(pool))
        .with_context(|| format!("loading pool settings {pool}"))?;
    let state = StateFile::from_file(Path::new(state))?;

    let report = build_report(&settings, state, scale_down);
    match format {
        "text" => print!("{}", format_report(&report)),
        _ => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PoolSettings {
        PoolSettings::from_toml_str("namespace = \"test-ns\"\nname = \"statefulset-name\"\npod_capacity = 10")
            .unwrap()
    }

    fn state(json: &str) -> StateFile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn growth_is_reported_without_compaction() {
        let s = state(r#"{"replicas": 3, "vpods": [{"key": "test-ns/vpod-1", "vreplicas": 45}]}"#);
        let report = build_report(&settings(), s, false);

        assert_eq!(report.pool, "test-ns/statefulset-name");
        assert_eq!(report.total_expected, 45);
        assert_eq!(report.total_pending, 45);
        assert_eq!(report.scale_to, Some(5));
        assert!(report.compaction.is_none());
    }

    #[test]
    fn periodic_cycle_plans_tail_evictions() {
        let s = state(
            r#"{
                "replicas": 2,
                "vpods": [{
                    "key": "test-ns/vpod-1",
                    "vreplicas": 10,
                    "placements": [
                        {"pod_name": "statefulset-name-0", "vreplicas": 8},
                        {"pod_name": "statefulset-name-1", "vreplicas": 2}
                    ]
                }]
            }"#,
        );
        let report = build_report(&settings(), s, true);

        assert_eq!(report.scale_to, Some(1));
        let plan = report.compaction.unwrap();
        assert_eq!(plan.evictions.len(), 1);
        assert_eq!(plan.evictions[0].placement.pod_name, "statefulset-name-1");
    }

    #[test]
    fn reservations_are_read_from_state() {
        let s = state(
            r#"{
                "replicas": 2,
                "vpods": [],
                "reserved": {"test-ns/vpod-new": {"statefulset-name-0": 4}}
            }"#,
        );
        let report = build_report(&settings(), s, false);

        assert_eq!(report.free_capacity, 16);
        assert_eq!(report.scale_to, None);
    }

    #[test]
    fn text_report_names_the_resize() {
        let s = state(r#"{"replicas": 3, "vpods": [{"key": "test-ns/vpod-1", "vreplicas": 5}]}"#);
        let text = format_report(&build_report(&settings(), s, true));

        assert!(text.contains("resize: 3 -> 1"));
        assert!(text.contains("compaction of statefulset-name-2"));
    }

    #[test]
    fn plan_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let pool = dir.path().join("pool.toml");
        let state = dir.path().join("state.json");
        std::fs::write(&pool, "namespace = \"test-ns\"\nname = \"statefulset-name\"\npod_capacity = 10\n").unwrap();
        std::fs::write(&state, r#"{"replicas": 0}"#).unwrap();

        plan(pool.to_str().unwrap(), state.to_str().unwrap(), true, "json").unwrap();
    }

    #[test]
    fn missing_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pool = dir.path().join("pool.toml");
        std::fs::write(&pool, "namespace = \"test-ns\"\nname = \"statefulset-name\"\npod_capacity = 10\n").unwrap();

        let err = plan(pool.to_str().unwrap(), "/nonexistent/state.json", false, "json").unwrap_err();
        assert!(err.to_string().contains("reading state file"));
    }
}
