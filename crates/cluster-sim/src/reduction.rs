//! Cluster reduction search
//!
//! Greedy drain simulation: every pass replays all workloads onto the nodes
//! still active, then removes the first node (in input order) whose pods can
//! all be evicted and re-placed on the others. Passes repeat until no node
//! qualifies or a single node is left.

use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::eviction::{Budget, EvictionGate};
use crate::models::{Node, PodDisruptionBudget, Workload, WorkloadKind};
use crate::report::{NodeUtilization, ReductionReport, UnschedulableWorkload};
use crate::scheduler::{expand, ClusterState, NodeId, PlannedWorkload, Scheduler};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Allocation reached by replaying every workload onto a set of nodes
struct Baseline<'a> {
    state: ClusterState<'a>,
    /// Desired pod count per planned workload, same order
    desired: Vec<u32>,
    unschedulable: Vec<UnschedulableWorkload>,
}

/// A validated reduction problem over a fixed node inventory
#[derive(Debug, Clone)]
pub struct ClusterReduction<'a> {
    nodes: &'a [Node],
    /// Sorted by key, which is replay order
    workloads: Vec<PlannedWorkload>,
    budgets: Vec<Budget>,
    config: SimulationConfig,
}

impl<'a> ClusterReduction<'a> {
    pub fn new(
        nodes: &'a [Node],
        workloads: &[Workload],
        pdbs: &[PodDisruptionBudget],
        config: SimulationConfig,
    ) -> SimulationResult<Self> {
        config.validate()?;

        let mut names = HashSet::with_capacity(nodes.len());
        for node in nodes {
            if !names.insert(node.name.as_str()) {
                return Err(SimulationError::DuplicateNode(node.name.clone()));
            }
        }

        let mut planned = workloads
            .iter()
            .map(PlannedWorkload::compile)
            .collect::<SimulationResult<Vec<_>>>()?;
        planned.sort_by(|a, b| a.key.cmp(&b.key));

        let budgets = pdbs
            .iter()
            .map(Budget::compile)
            .collect::<SimulationResult<Vec<_>>>()?;

        Ok(Self {
            nodes,
            workloads: planned,
            budgets,
            config,
        })
    }

    fn all_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    fn baseline(&self, active: &[NodeId]) -> Baseline<'a> {
        let state = ClusterState::new(self.nodes, active.iter().copied(), self.config);
        let mut scheduler = Scheduler::new(state);
        let mut desired = Vec::with_capacity(self.workloads.len());
        let mut unschedulable = Vec::new();

        for workload in &self.workloads {
            let expansion = expand(&mut scheduler, workload);
            desired.push(workload.desired_pods(expansion.placed));
            if let Some(failure) = expansion.failure {
                unschedulable.push(UnschedulableWorkload {
                    workload: workload.key.clone(),
                    placed: expansion.placed,
                    requested: expansion.requested,
                    reason: failure.to_string(),
                });
            }
        }

        Baseline {
            state: scheduler.into_state(),
            desired,
            unschedulable,
        }
    }

    /// Whether every pod on `candidate` can be evicted and re-placed on the
    /// other active nodes
    fn is_removable(&self, baseline: &Baseline<'a>, candidate: NodeId) -> bool {
        let pods = &baseline.state.allocation(candidate).pods;
        if pods.is_empty() {
            return true;
        }

        let desired = self
            .workloads
            .iter()
            .zip(&baseline.desired)
            .map(|(workload, count)| (&*workload.pod, *count));
        let gate = EvictionGate::new(&self.budgets, &baseline.state, desired);
        let node = &self.nodes[candidate.0].name;
        let mut scheduler = Scheduler::new(baseline.state.without(candidate));

        for pod in pods {
            if self.config.skip_daemon_set_pods && pod.owner.kind == WorkloadKind::DaemonSet {
                continue;
            }
            if let Some(budget) = gate.blocking(pod) {
                debug!(
                    node = %node,
                    workload = %pod.owner,
                    pdb = %budget.name,
                    "eviction blocked by disruption budget"
                );
                return false;
            }
            if let Err(failures) = scheduler.place(pod) {
                debug!(
                    node = %node,
                    workload = %pod.owner,
                    reason = %failures,
                    "displaced pod does not fit elsewhere"
                );
                return false;
            }
        }
        true
    }

    fn reduce(&self, active: Vec<NodeId>, removed: &mut Vec<NodeId>) {
        if active.len() <= 1 {
            return;
        }

        let baseline = self.baseline(&active);
        let Some(candidate) = active
            .iter()
            .copied()
            .find(|id| self.is_removable(&baseline, *id))
        else {
            return;
        };

        info!(
            event = "node_removable",
            node = %self.nodes[candidate.0].name,
            pass = removed.len() + 1,
            "node can be drained"
        );
        removed.push(candidate);

        let remaining = active.into_iter().filter(|id| *id != candidate).collect();
        self.reduce(remaining, removed);
    }

    fn removable_ids(&self) -> Vec<NodeId> {
        let mut removed = Vec::new();
        self.reduce(self.all_ids(), &mut removed);
        removed
    }

    /// Nodes that can be removed, in removal order
    pub fn find_removable_nodes(&self) -> Vec<Node> {
        self.removable_ids()
            .into_iter()
            .map(|id| self.nodes[id.0].clone())
            .collect()
    }

    /// Whether the named node alone could be drained from the full cluster
    pub fn can_remove_node(&self, name: &str) -> SimulationResult<bool> {
        let baseline = self.baseline(&self.all_ids());
        let id = baseline
            .state
            .find(name)
            .ok_or_else(|| SimulationError::NodeNotFound(name.to_string()))?;

        if self.nodes.len() <= 1 {
            return Ok(false);
        }
        Ok(self.is_removable(&baseline, id))
    }

    /// Baseline utilization of every node, by name
    pub fn utilization(&self) -> BTreeMap<String, NodeUtilization> {
        let baseline = self.baseline(&self.all_ids());
        utilization_of(&baseline.state)
    }

    /// Workloads that do not fully fit on the full cluster
    pub fn unschedulable(&self) -> Vec<UnschedulableWorkload> {
        self.baseline(&self.all_ids()).unschedulable
    }

    pub fn report(&self) -> ReductionReport {
        let baseline = self.baseline(&self.all_ids());
        let removable_nodes = self
            .removable_ids()
            .into_iter()
            .map(|id| self.nodes[id.0].name.clone())
            .collect();

        ReductionReport {
            total_nodes: self.nodes.len(),
            removable_nodes,
            utilization: utilization_of(&baseline.state),
            unschedulable: baseline.unschedulable,
            generated_at: chrono::Utc::now().timestamp(),
        }
    }
}

fn utilization_of(state: &ClusterState<'_>) -> BTreeMap<String, NodeUtilization> {
    state
        .ids()
        .map(|id| (state.node(id).name.clone(), state.utilization(id)))
        .collect()
}

/// Nodes that could be removed from `nodes` while keeping every workload
/// placed and every disruption budget satisfied
pub fn find_removable_nodes(
    nodes: &[Node],
    workloads: &[Workload],
    pdbs: &[PodDisruptionBudget],
    config: SimulationConfig,
) -> SimulationResult<Vec<Node>> {
    Ok(ClusterReduction::new(nodes, workloads, pdbs, config)?.find_removable_nodes())
}
