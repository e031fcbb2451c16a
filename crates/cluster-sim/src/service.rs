//! Stateful scheduling service
//!
//! Workloads are discovered incrementally by several pipelines at once, so
//! the service accumulates registrations behind one lock and runs a
//! reduction over a consistent copy on demand.

use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::models::{ClusterSnapshot, Node, PodDisruptionBudget, Workload, WorkloadKey};
use crate::observability::{SimulationMetrics, StructuredLogger};
use crate::reduction::ClusterReduction;
use crate::report::{NodeUtilization, ReductionReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Registered inputs, keyed so re-registration overwrites
#[derive(Debug, Clone, Default)]
struct Registry {
    /// Input order matters for candidate selection, so nodes stay a list
    nodes: Vec<Node>,
    workloads: BTreeMap<WorkloadKey, Workload>,
    pdbs: BTreeMap<(String, String), PodDisruptionBudget>,
}

impl Registry {
    fn to_snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self.nodes.clone(),
            workloads: self.workloads.values().cloned().collect(),
            pdbs: self.pdbs.values().cloned().collect(),
        }
    }
}

/// Registration counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub nodes: usize,
    pub workloads: usize,
    pub pdbs: usize,
}

/// Shared handle to the registration set; clones share state
#[derive(Debug, Clone)]
pub struct SchedulingService {
    registry: Arc<RwLock<Registry>>,
    config: SimulationConfig,
    metrics: SimulationMetrics,
    logger: StructuredLogger,
}

impl SchedulingService {
    pub fn new(cluster_name: impl Into<String>, config: SimulationConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            config,
            metrics: SimulationMetrics::new(),
            logger: StructuredLogger::new(cluster_name),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the node inventory
    pub async fn set_nodes(&self, nodes: Vec<Node>) {
        let mut registry = self.registry.write().await;
        registry.nodes = nodes;
    }

    /// Register a node, replacing one with the same name in place
    pub async fn add_node(&self, node: Node) {
        let mut registry = self.registry.write().await;
        self.logger.log_registration("node", &node.name, true);
        match registry.nodes.iter_mut().find(|n| n.name == node.name) {
            Some(existing) => *existing = node,
            None => registry.nodes.push(node),
        }
    }

    pub async fn remove_node(&self, name: &str) -> bool {
        let mut registry = self.registry.write().await;
        let before = registry.nodes.len();
        registry.nodes.retain(|n| n.name != name);
        let removed = registry.nodes.len() != before;
        if removed {
            self.logger.log_registration("node", name, false);
        }
        removed
    }

    /// Register a workload under its (kind, namespace, name) key
    pub async fn add_workload(&self, workload: Workload) {
        let mut registry = self.registry.write().await;
        let key = workload.key();
        self.logger.log_registration("workload", &key.to_string(), true);
        registry.workloads.insert(key, workload);
        self.metrics.set_registered_workloads(registry.workloads.len());
    }

    pub async fn remove_workload(&self, key: &WorkloadKey) -> bool {
        let mut registry = self.registry.write().await;
        let removed = registry.workloads.remove(key).is_some();
        if removed {
            self.logger.log_registration("workload", &key.to_string(), false);
            self.metrics.set_registered_workloads(registry.workloads.len());
        }
        removed
    }

    pub async fn add_pdb(&self, pdb: PodDisruptionBudget) {
        let mut registry = self.registry.write().await;
        let key = pdb.key();
        self.logger
            .log_registration("pdb", &format!("{}/{}", key.0, key.1), true);
        registry.pdbs.insert(key, pdb);
    }

    pub async fn remove_pdb(&self, namespace: &str, name: &str) -> bool {
        let mut registry = self.registry.write().await;
        let removed = registry
            .pdbs
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some();
        if removed {
            self.logger
                .log_registration("pdb", &format!("{}/{}", namespace, name), false);
        }
        removed
    }

    /// Replace every registration with the contents of `snapshot`
    pub async fn load_snapshot(&self, snapshot: ClusterSnapshot) {
        let mut registry = self.registry.write().await;
        registry.nodes = snapshot.nodes;
        registry.workloads = snapshot
            .workloads
            .into_iter()
            .map(|w| (w.key(), w))
            .collect();
        registry.pdbs = snapshot.pdbs.into_iter().map(|p| (p.key(), p)).collect();
        self.metrics.set_registered_workloads(registry.workloads.len());
    }

    /// Consistent copy of the current registrations
    pub async fn snapshot(&self) -> ClusterSnapshot {
        self.registry.read().await.to_snapshot()
    }

    pub async fn stats(&self) -> RegistryStats {
        let registry = self.registry.read().await;
        RegistryStats {
            nodes: registry.nodes.len(),
            workloads: registry.workloads.len(),
            pdbs: registry.pdbs.len(),
        }
    }

    /// Run `f` over a reduction of the current registrations on the
    /// blocking pool; the search is CPU-bound
    async fn with_reduction<T, F>(&self, snapshot: ClusterSnapshot, f: F) -> SimulationResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ClusterReduction<'_>) -> SimulationResult<T> + Send + 'static,
    {
        let config = self.config;
        let result = tokio::task::spawn_blocking(move || {
            let reduction =
                ClusterReduction::new(&snapshot.nodes, &snapshot.workloads, &snapshot.pdbs, config)?;
            f(&reduction)
        })
        .await
        .unwrap_or_else(|err| Err(SimulationError::TaskFailed(err.to_string())));

        result.inspect_err(|err| {
            self.metrics.inc_simulation_errors();
            self.logger.log_simulation_failed(&err.to_string());
        })
    }

    /// Nodes that can be removed from the registered cluster, in removal order
    pub async fn simulate(&self) -> SimulationResult<Vec<Node>> {
        let snapshot = self.snapshot().await;
        let total_nodes = snapshot.nodes.len();
        let started = Instant::now();
        self.logger
            .log_simulation_started(total_nodes, snapshot.workloads.len(), snapshot.pdbs.len());

        let removable = self
            .with_reduction(snapshot, |reduction| Ok(reduction.find_removable_nodes()))
            .await?;

        let elapsed = started.elapsed().as_secs_f64();
        for node in &removable {
            self.logger
                .log_node_removable(&node.name, node.cpu_millis, node.memory_bytes);
        }
        self.metrics.observe_simulation(elapsed, removable.len());
        self.logger
            .log_simulation_finished(removable.len(), total_nodes, elapsed);
        Ok(removable)
    }

    /// Removable nodes plus baseline utilization and unschedulable workloads
    pub async fn report(&self) -> SimulationResult<ReductionReport> {
        let snapshot = self.snapshot().await;
        let started = Instant::now();
        self.logger.log_simulation_started(
            snapshot.nodes.len(),
            snapshot.workloads.len(),
            snapshot.pdbs.len(),
        );

        let report = self
            .with_reduction(snapshot, |reduction| Ok(reduction.report()))
            .await?;

        let elapsed = started.elapsed().as_secs_f64();
        for workload in &report.unschedulable {
            self.logger.log_workload_unschedulable(
                &workload.workload.to_string(),
                workload.placed,
                workload.requested,
                &workload.reason,
            );
        }
        self.metrics.inc_unschedulable_workloads(report.unschedulable.len());
        self.metrics
            .observe_simulation(elapsed, report.removable_nodes.len());
        self.logger
            .log_simulation_finished(report.removable_nodes.len(), report.total_nodes, elapsed);
        Ok(report)
    }

    pub async fn can_remove_node(&self, name: &str) -> SimulationResult<bool> {
        let snapshot = self.snapshot().await;
        let name = name.to_string();
        self.with_reduction(snapshot, move |reduction| reduction.can_remove_node(&name))
            .await
    }

    pub async fn utilization(&self) -> SimulationResult<BTreeMap<String, NodeUtilization>> {
        let snapshot = self.snapshot().await;
        self.with_reduction(snapshot, |reduction| Ok(reduction.utilization()))
            .await
    }
}
