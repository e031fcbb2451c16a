//! Per-node allocation state
//!
//! Nodes live in an immutable arena (`&[Node]`) addressed by [`NodeId`].
//! A [`ClusterState`] is an allocation overlay over a subset of that arena;
//! every simulation pass builds a fresh one, so capacity is never mutated
//! and nested passes never alias each other's counters.

use super::request::PodRequest;
use crate::config::SimulationConfig;
use crate::models::Node;
use crate::report::NodeUtilization;
use crate::selector::LabelSelector;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Index of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Running totals for one node
#[derive(Debug, Clone, Default)]
pub struct NodeAllocation {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
    /// Pods placed on the node, in placement order
    pub pods: Vec<Arc<PodRequest>>,
}

static EMPTY_ALLOCATION: NodeAllocation = NodeAllocation {
    cpu_millis: 0,
    memory_bytes: 0,
    pods: Vec::new(),
};

impl NodeAllocation {
    pub fn pod_count(&self) -> u32 {
        self.pods.len() as u32
    }
}

/// Headroom-adjusted capacity of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLimits {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
    pub pods: u32,
}

impl NodeLimits {
    pub fn for_node(node: &Node, config: &SimulationConfig) -> Self {
        Self {
            cpu_millis: scaled(node.cpu_millis, config.cpu_headroom),
            memory_bytes: scaled(node.memory_bytes, config.memory_headroom),
            pods: scaled(u64::from(node.max_pods), config.pod_headroom) as u32,
        }
    }
}

/// `floor(value * factor)`, snapping to the nearest integer when the product
/// is within rounding error of it (4000 * 0.85 must give 3400, not 3399)
fn scaled(value: u64, factor: f64) -> u64 {
    let exact = value as f64 * factor;
    let nearest = exact.round();
    if (exact - nearest).abs() <= exact.abs().max(1.0) * 4.0 * f64::EPSILON {
        nearest as u64
    } else {
        exact.floor() as u64
    }
}

fn ratio(used: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        used as f64 / capacity as f64
    }
}

/// Allocation overlay over the active nodes of one simulation pass
#[derive(Debug, Clone)]
pub struct ClusterState<'a> {
    nodes: &'a [Node],
    config: SimulationConfig,
    allocations: BTreeMap<NodeId, NodeAllocation>,
}

impl<'a> ClusterState<'a> {
    /// Empty overlay over the given subset of `nodes`
    pub fn new(
        nodes: &'a [Node],
        active: impl IntoIterator<Item = NodeId>,
        config: SimulationConfig,
    ) -> Self {
        let allocations = active
            .into_iter()
            .filter(|id| id.0 < nodes.len())
            .map(|id| (id, NodeAllocation::default()))
            .collect();
        Self {
            nodes,
            config,
            allocations,
        }
    }

    /// Empty overlay over every node
    pub fn all(nodes: &'a [Node], config: SimulationConfig) -> Self {
        Self::new(nodes, (0..nodes.len()).map(NodeId), config)
    }

    /// Active node ids in input order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.allocations.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &'a Node {
        &self.nodes[id.0]
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.ids().find(|id| self.node(*id).name == name)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Allocation of an active node; inactive ids read as empty
    pub fn allocation(&self, id: NodeId) -> &NodeAllocation {
        self.allocations.get(&id).unwrap_or(&EMPTY_ALLOCATION)
    }

    pub fn limits(&self, id: NodeId) -> NodeLimits {
        NodeLimits::for_node(self.node(id), &self.config)
    }

    /// Record `pod` as running on `id`
    pub fn commit(&mut self, id: NodeId, pod: Arc<PodRequest>) {
        if let Some(allocation) = self.allocations.get_mut(&id) {
            allocation.cpu_millis = allocation.cpu_millis.saturating_add(pod.demand.cpu_millis);
            allocation.memory_bytes = allocation.memory_bytes.saturating_add(pod.demand.memory_bytes);
            allocation.pods.push(pod);
        }
    }

    /// Copy of this overlay with `id` taken out of the active set
    pub fn without(&self, id: NodeId) -> Self {
        let mut reduced = self.clone();
        reduced.allocations.remove(&id);
        reduced
    }

    /// Packing score used to order candidate nodes: the larger of the CPU
    /// and memory allocation ratios
    pub fn most_allocated_score(&self, id: NodeId) -> f64 {
        let node = self.node(id);
        let allocation = self.allocation(id);
        ratio(allocation.cpu_millis, node.cpu_millis)
            .max(ratio(allocation.memory_bytes, node.memory_bytes))
    }

    /// Allocation ratios against raw capacity
    pub fn utilization(&self, id: NodeId) -> NodeUtilization {
        let node = self.node(id);
        let allocation = self.allocation(id);
        NodeUtilization {
            cpu_ratio: ratio(allocation.cpu_millis, node.cpu_millis),
            memory_ratio: ratio(allocation.memory_bytes, node.memory_bytes),
            pod_ratio: ratio(u64::from(allocation.pod_count()), u64::from(node.max_pods)),
        }
    }

    /// Every placed pod with its node
    pub fn pods(&self) -> impl Iterator<Item = (NodeId, &Arc<PodRequest>)> + '_ {
        self.allocations
            .iter()
            .flat_map(|(id, allocation)| allocation.pods.iter().map(move |pod| (*id, pod)))
    }

    /// Number of placed pods whose labels match `selector`
    pub fn count_matching(&self, selector: &LabelSelector) -> usize {
        self.pods()
            .filter(|(_, pod)| selector.matches(&pod.labels))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PodTemplate, WorkloadKey, WorkloadKind};
    use crate::scheduler::resources::ResourceDemand;

    const GI: u64 = 1 << 30;

    fn pod(cpu_millis: u64, memory_bytes: u64) -> Arc<PodRequest> {
        let owner = WorkloadKey {
            kind: WorkloadKind::Pod,
            namespace: "default".to_string(),
            name: "p".to_string(),
        };
        let mut request = PodRequest::from_template(owner, &PodTemplate::default()).unwrap();
        request.demand = ResourceDemand::new(cpu_millis, memory_bytes);
        Arc::new(request)
    }

    #[test]
    fn test_limits_apply_headroom() {
        let node = Node::new("n1", 4000, 8 * GI, 110);
        let limits = NodeLimits::for_node(&node, &SimulationConfig::default());

        assert_eq!(limits.cpu_millis, 3400);
        assert_eq!(limits.memory_bytes, 7_301_444_403);
        assert_eq!(limits.pods, 104);
    }

    #[test]
    fn test_commit_and_utilization() {
        let nodes = vec![Node::new("n1", 4000, 8 * GI, 10), Node::new("n2", 4000, 8 * GI, 10)];
        let mut state = ClusterState::all(&nodes, SimulationConfig::default());

        state.commit(NodeId(0), pod(1000, 4 * GI));

        let util = state.utilization(NodeId(0));
        assert_eq!(util.cpu_ratio, 0.25);
        assert_eq!(util.memory_ratio, 0.5);
        assert_eq!(util.pod_ratio, 0.1);
        assert_eq!(state.most_allocated_score(NodeId(0)), 0.5);
        assert_eq!(state.most_allocated_score(NodeId(1)), 0.0);
    }

    #[test]
    fn test_without_drops_node_but_keeps_others() {
        let nodes = vec![Node::new("n1", 1000, GI, 10), Node::new("n2", 1000, GI, 10)];
        let mut state = ClusterState::all(&nodes, SimulationConfig::default());
        state.commit(NodeId(1), pod(100, 0));

        let reduced = state.without(NodeId(0));

        assert_eq!(reduced.ids().collect::<Vec<_>>(), vec![NodeId(1)]);
        assert_eq!(reduced.allocation(NodeId(1)).pod_count(), 1);
        assert_eq!(reduced.allocation(NodeId(0)).pod_count(), 0);
        assert_eq!(state.len(), 2);
        assert_eq!(reduced.find("n2"), Some(NodeId(1)));
        assert_eq!(reduced.find("n1"), None);
    }
}
