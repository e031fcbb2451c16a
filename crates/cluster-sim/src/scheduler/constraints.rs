//! Placement constraint checks for a (pod, node) pair
//!
//! Checks run in a fixed order and stop at the first failure so the
//! reported reason is deterministic. None of them mutate state.

use super::reason::Unschedulable;
use super::request::PodRequest;
use super::state::{ClusterState, NodeId};
use crate::models::{Node, PodAffinityTerm, TaintEffect};

/// Decide whether `pod` may be placed on node `id` given the current state
pub fn can_place(pod: &PodRequest, id: NodeId, state: &ClusterState<'_>) -> Result<(), Unschedulable> {
    fits_resources(pod, id, state)?;
    let node = state.node(id);
    tolerates_taints(pod, node)?;
    matches_node_affinity(pod, node)?;
    satisfies_pod_affinity(pod, node, state)?;
    matches_node_selector(pod, node)
}

fn fits_resources(pod: &PodRequest, id: NodeId, state: &ClusterState<'_>) -> Result<(), Unschedulable> {
    let limits = state.limits(id);
    let allocation = state.allocation(id);

    if allocation.cpu_millis.saturating_add(pod.demand.cpu_millis) > limits.cpu_millis {
        return Err(Unschedulable::NotEnoughCpu);
    }
    if allocation.memory_bytes.saturating_add(pod.demand.memory_bytes) > limits.memory_bytes {
        return Err(Unschedulable::NotEnoughMemory);
    }
    if allocation.pod_count() >= limits.pods {
        return Err(Unschedulable::NotEnoughPods);
    }
    Ok(())
}

fn tolerates_taints(pod: &PodRequest, node: &Node) -> Result<(), Unschedulable> {
    let untolerated = node
        .taints
        .iter()
        .filter(|taint| taint.effect != TaintEffect::PreferNoSchedule)
        .any(|taint| !pod.tolerations.iter().any(|t| t.tolerates(taint)));
    if untolerated {
        Err(Unschedulable::NotTolerated)
    } else {
        Ok(())
    }
}

fn matches_node_affinity(pod: &PodRequest, node: &Node) -> Result<(), Unschedulable> {
    let Some(affinity) = pod.node_affinity.as_ref().filter(|a| !a.required_terms.is_empty()) else {
        return Ok(());
    };
    // Terms are OR-ed; an empty term matches nothing.
    let matched = affinity.required_terms.iter().any(|term| {
        !term.match_expressions.is_empty()
            && term.match_expressions.iter().all(|r| r.matches(&node.labels))
    });
    if matched {
        Ok(())
    } else {
        Err(Unschedulable::NodeAffinityUnsatisfied)
    }
}

/// Whether any node in `node`'s topology domain hosts a pod matching `term`.
/// `None` when `node` has no value for the topology key.
fn domain_has_match(term: &PodAffinityTerm, node: &Node, state: &ClusterState<'_>) -> Option<bool> {
    let domain = node.labels.get(&term.topology_key)?;
    let found = state
        .pods()
        .filter(|(id, _)| state.node(*id).labels.get(&term.topology_key) == Some(domain))
        .any(|(_, placed)| term.label_selector.matches(&placed.labels));
    Some(found)
}

fn satisfies_pod_affinity(
    pod: &PodRequest,
    node: &Node,
    state: &ClusterState<'_>,
) -> Result<(), Unschedulable> {
    for term in &pod.pod_affinity {
        if domain_has_match(term, node, state) == Some(true) {
            continue;
        }
        // First pod of a group that selects itself may start in any domain.
        let bootstrap = node.labels.contains_key(&term.topology_key)
            && term.label_selector.matches(&pod.labels)
            && state.count_matching(&term.label_selector) == 0;
        if !bootstrap {
            return Err(Unschedulable::AffinityUnsatisfied);
        }
    }

    for term in &pod.pod_anti_affinity {
        if domain_has_match(term, node, state) == Some(true) {
            return Err(Unschedulable::AffinityUnsatisfied);
        }
    }

    Ok(())
}

fn matches_node_selector(pod: &PodRequest, node: &Node) -> Result<(), Unschedulable> {
    for (key, value) in &pod.node_selector {
        match node.labels.get(key) {
            None => return Err(Unschedulable::NodeSelectorKeyMissing),
            Some(actual) if actual != value => {
                return Err(Unschedulable::NodeSelectorValueMismatch)
            }
            Some(_) => {}
        }
    }
    Ok(())
}
