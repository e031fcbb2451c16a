//! Placement of single pods
//!
//! Candidate nodes are tried most-allocated first. Packing pods onto the
//! fullest node that still fits leaves as many nodes as possible empty,
//! and empty nodes are the ones a reduction can remove.

use super::constraints::can_place;
use super::reason::{FailureSummary, Unschedulable};
use super::request::PodRequest;
use super::state::{ClusterState, NodeId};
use std::sync::Arc;
use tracing::debug;

/// Places pods onto a [`ClusterState`], committing each success
#[derive(Debug, Clone)]
pub struct Scheduler<'a> {
    state: ClusterState<'a>,
}

impl<'a> Scheduler<'a> {
    pub fn new(state: ClusterState<'a>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ClusterState<'a> {
        &self.state
    }

    pub fn into_state(self) -> ClusterState<'a> {
        self.state
    }

    /// Active nodes sorted by descending packing score; ties keep input order
    fn candidates(&self) -> Vec<NodeId> {
        let mut scored: Vec<(NodeId, f64)> = self
            .state
            .ids()
            .map(|id| (id, self.state.most_allocated_score(id)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// Place `pod` on the first acceptable node
    ///
    /// On failure, returns why each node rejected the pod.
    pub fn place(&mut self, pod: &Arc<PodRequest>) -> Result<NodeId, FailureSummary> {
        let mut failures = FailureSummary::default();

        for id in self.candidates() {
            match can_place(pod, id, &self.state) {
                Ok(()) => {
                    self.state.commit(id, Arc::clone(pod));
                    debug!(
                        workload = %pod.owner,
                        node = %self.state.node(id).name,
                        "placed pod"
                    );
                    return Ok(id);
                }
                Err(reason) => failures.record(reason),
            }
        }

        debug!(workload = %pod.owner, reason = %failures, "pod could not be placed");
        Err(failures)
    }

    /// Place `pod` on a specific node, bypassing candidate ordering
    pub fn place_on(&mut self, pod: &Arc<PodRequest>, id: NodeId) -> Result<(), Unschedulable> {
        can_place(pod, id, &self.state)?;
        self.state.commit(id, Arc::clone(pod));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::{Container, Node, PodTemplate, WorkloadKey, WorkloadKind};

    const GI: u64 = 1 << 30;

    fn pod(cpu_millis: u64, memory_bytes: u64) -> Arc<PodRequest> {
        let owner = WorkloadKey {
            kind: WorkloadKind::Deployment,
            namespace: "default".to_string(),
            name: "web".to_string(),
        };
        let template =
            PodTemplate::default().with_container(Container::with_requests("c", cpu_millis, memory_bytes));
        Arc::new(PodRequest::from_template(owner, &template).unwrap())
    }

    #[test]
    fn test_prefers_most_allocated_node() {
        let nodes = vec![Node::new("n1", 4000, 8 * GI, 110), Node::new("n2", 4000, 8 * GI, 110)];
        let mut state = ClusterState::all(&nodes, SimulationConfig::default());
        state.commit(NodeId(1), pod(1000, GI));
        let mut scheduler = Scheduler::new(state);

        assert_eq!(scheduler.place(&pod(500, GI)), Ok(NodeId(1)));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let nodes = vec![Node::new("n1", 4000, 8 * GI, 110), Node::new("n2", 4000, 8 * GI, 110)];
        let mut scheduler = Scheduler::new(ClusterState::all(&nodes, SimulationConfig::default()));

        assert_eq!(scheduler.place(&pod(500, GI)), Ok(NodeId(0)));
        assert_eq!(scheduler.place(&pod(500, GI)), Ok(NodeId(0)));
    }

    #[test]
    fn test_exact_headroom_fill_succeeds() {
        // 4000m * 0.85 = 3400m usable
        let nodes = vec![Node::new("n1", 4000, 8 * GI, 110)];
        let mut scheduler = Scheduler::new(ClusterState::all(&nodes, SimulationConfig::default()));

        assert_eq!(scheduler.place(&pod(3400, GI)), Ok(NodeId(0)));
        let failure = scheduler.place(&pod(1, 0)).unwrap_err();
        assert_eq!(failure.count(Unschedulable::NotEnoughCpu), 1);
    }

    #[test]
    fn test_headroom_plus_epsilon_fails() {
        let nodes = vec![Node::new("n1", 4000, 8 * GI, 110), Node::new("n2", 4000, 8 * GI, 110)];
        let mut scheduler = Scheduler::new(ClusterState::all(&nodes, SimulationConfig::default()));

        let failure = scheduler.place(&pod(3401, GI)).unwrap_err();
        assert_eq!(failure.to_string(), "not enough cpu on 2 nodes");
        assert_eq!(scheduler.state().allocation(NodeId(0)).pod_count(), 0);
    }

    #[test]
    fn test_never_exceeds_headroom() {
        let nodes = vec![Node::new("n1", 2000, 4 * GI, 110), Node::new("n2", 3000, 2 * GI, 110)];
        let mut scheduler = Scheduler::new(ClusterState::all(&nodes, SimulationConfig::default()));

        for _ in 0..50 {
            let _ = scheduler.place(&pod(300, GI / 3));
        }

        let state = scheduler.state();
        for id in state.ids() {
            let limits = state.limits(id);
            let allocation = state.allocation(id);
            assert!(allocation.cpu_millis <= limits.cpu_millis);
            assert!(allocation.memory_bytes <= limits.memory_bytes);
            assert!(allocation.pod_count() <= limits.pods);
        }
    }
}
