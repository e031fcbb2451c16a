//! Observability for the scheduling simulator
//!
//! Provides:
//! - Prometheus metrics (simulation latency, removable nodes, registrations)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for simulation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SimulationMetricsInner> = OnceLock::new();

struct SimulationMetricsInner {
    simulation_latency_seconds: Histogram,
    simulations: IntCounter,
    removable_nodes: IntGauge,
    registered_workloads: IntGauge,
    unschedulable_workloads: IntCounter,
    simulation_errors: IntCounter,
}

impl SimulationMetricsInner {
    fn new() -> Self {
        Self {
            simulation_latency_seconds: register_histogram!(
                "kube_reduce_simulation_latency_seconds",
                "Time spent running a cluster reduction simulation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register simulation_latency_seconds"),

            simulations: register_int_counter!(
                "kube_reduce_simulations_total",
                "Total number of reduction simulations run"
            )
            .expect("Failed to register simulations_total"),

            removable_nodes: register_int_gauge!(
                "kube_reduce_removable_nodes",
                "Nodes judged removable by the latest simulation"
            )
            .expect("Failed to register removable_nodes"),

            registered_workloads: register_int_gauge!(
                "kube_reduce_registered_workloads",
                "Workloads currently registered for simulation"
            )
            .expect("Failed to register registered_workloads"),

            unschedulable_workloads: register_int_counter!(
                "kube_reduce_unschedulable_workloads_total",
                "Workloads that could not be fully scheduled in a simulation baseline"
            )
            .expect("Failed to register unschedulable_workloads_total"),

            simulation_errors: register_int_counter!(
                "kube_reduce_simulation_errors_total",
                "Simulations aborted by invalid input"
            )
            .expect("Failed to register simulation_errors_total"),
        }
    }
}

/// Simulation metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    _private: (),
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SimulationMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SimulationMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record one finished simulation
    pub fn observe_simulation(&self, duration_secs: f64, removable_nodes: usize) {
        let inner = self.inner();
        inner.simulation_latency_seconds.observe(duration_secs);
        inner.simulations.inc();
        inner.removable_nodes.set(removable_nodes as i64);
    }

    pub fn set_registered_workloads(&self, count: usize) {
        self.inner().registered_workloads.set(count as i64);
    }

    pub fn inc_unschedulable_workloads(&self, count: usize) {
        self.inner().unschedulable_workloads.inc_by(count as u64);
    }

    pub fn inc_simulation_errors(&self) {
        self.inner().simulation_errors.inc();
    }
}

/// Structured logger for simulation events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    cluster: String,
}

impl StructuredLogger {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn log_simulation_started(&self, nodes: usize, workloads: usize, pdbs: usize) {
        info!(
            event = "simulation_started",
            cluster = %self.cluster,
            nodes = nodes,
            workloads = workloads,
            pdbs = pdbs,
            "Starting cluster reduction simulation"
        );
    }

    /// Log a node judged removable, with its raw capacity
    pub fn log_node_removable(&self, node: &str, cpu_millis: u64, memory_bytes: u64) {
        info!(
            event = "node_removable",
            cluster = %self.cluster,
            node = %node,
            cpu_millis = cpu_millis,
            memory_bytes = memory_bytes,
            "Node can be removed"
        );
    }

    pub fn log_workload_unschedulable(&self, workload: &str, placed: u32, requested: u32, reason: &str) {
        warn!(
            event = "workload_unschedulable",
            cluster = %self.cluster,
            workload = %workload,
            placed = placed,
            requested = requested,
            reason = %reason,
            "Workload could not be fully scheduled"
        );
    }

    pub fn log_simulation_finished(&self, removable: usize, total: usize, duration_secs: f64) {
        info!(
            event = "simulation_finished",
            cluster = %self.cluster,
            removable_nodes = removable,
            total_nodes = total,
            duration_secs = duration_secs,
            "Cluster reduction simulation finished"
        );
    }

    pub fn log_simulation_failed(&self, error: &str) {
        warn!(
            event = "simulation_failed",
            cluster = %self.cluster,
            error = %error,
            "Cluster reduction simulation aborted"
        );
    }

    /// Log a registration change (`kind` is node, workload or pdb)
    pub fn log_registration(&self, kind: &str, key: &str, registered: bool) {
        let event = if registered { "registered" } else { "unregistered" };
        info!(
            event = event,
            cluster = %self.cluster,
            kind = %kind,
            key = %key,
            "Registration updated"
        );
    }
}
