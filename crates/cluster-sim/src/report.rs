//! Simulation results

use crate::models::WorkloadKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allocation ratios of one node against its raw capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUtilization {
    pub cpu_ratio: f64,
    pub memory_ratio: f64,
    pub pod_ratio: f64,
}

/// A workload whose pods did not all fit during the baseline replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnschedulableWorkload {
    pub workload: WorkloadKey,
    pub placed: u32,
    pub requested: u32,
    /// Aggregated node rejections for the first pod that failed
    pub reason: String,
}

/// Full outcome of a reduction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionReport {
    pub total_nodes: usize,
    /// Node names in removal order
    pub removable_nodes: Vec<String>,
    /// Baseline utilization per node name
    pub utilization: BTreeMap<String, NodeUtilization>,
    pub unschedulable: Vec<UnschedulableWorkload>,
    /// Unix timestamp in seconds
    pub generated_at: i64,
}

impl ReductionReport {
    pub fn remaining_nodes(&self) -> usize {
        self.total_nodes.saturating_sub(self.removable_nodes.len())
    }
}
