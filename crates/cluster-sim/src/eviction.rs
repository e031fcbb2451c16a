//! Disruption-budget checks for pod eviction
//!
//! Budgets apply cluster-wide: every budget whose selector matches a pod's
//! labels is consulted, regardless of namespace, and all of them must allow
//! the eviction.

use crate::error::{SimulationError, SimulationResult};
use crate::models::{IntOrPercent, PodDisruptionBudget};
use crate::scheduler::{ClusterState, PodRequest};
use crate::selector::LabelSelector;

/// Resolved form of an integer-or-percentage budget field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Count(u32),
    Percent(u32),
}

impl Threshold {
    fn parse(budget: &str, value: &IntOrPercent) -> SimulationResult<Self> {
        match value {
            IntOrPercent::Int(count) => Ok(Threshold::Count(*count)),
            IntOrPercent::Percent(text) => {
                let invalid = || SimulationError::InvalidBudget {
                    name: budget.to_string(),
                    reason: format!("malformed percentage {:?}", text),
                };
                let digits = text.trim().strip_suffix('%').ok_or_else(invalid)?;
                let percent: u32 = digits.trim().parse().map_err(|_| invalid())?;
                if percent > 100 {
                    return Err(invalid());
                }
                Ok(Threshold::Percent(percent))
            }
        }
    }

    /// Absolute pod count against `expected` pods, rounding percentages up
    pub fn resolve(&self, expected: u32) -> u32 {
        match *self {
            Threshold::Count(count) => count,
            Threshold::Percent(percent) => {
                let scaled = u64::from(expected) * u64::from(percent);
                scaled.div_ceil(100) as u32
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    MinAvailable(Threshold),
    MaxUnavailable(Threshold),
    Unconstrained,
}

/// A validated disruption budget
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub namespace: String,
    pub name: String,
    selector: LabelSelector,
    policy: Policy,
}

impl Budget {
    pub fn compile(pdb: &PodDisruptionBudget) -> SimulationResult<Self> {
        let context = format!("pdb {}/{}", pdb.namespace, pdb.name);
        pdb.selector.validate(&context)?;

        let policy = match (&pdb.min_available, &pdb.max_unavailable) {
            (Some(_), Some(_)) => {
                return Err(SimulationError::InvalidBudget {
                    name: pdb.name.clone(),
                    reason: "minAvailable and maxUnavailable are mutually exclusive".to_string(),
                })
            }
            (Some(min), None) => Policy::MinAvailable(Threshold::parse(&pdb.name, min)?),
            (None, Some(max)) => Policy::MaxUnavailable(Threshold::parse(&pdb.name, max)?),
            (None, None) => Policy::Unconstrained,
        };

        Ok(Self {
            namespace: pdb.namespace.clone(),
            name: pdb.name.clone(),
            selector: pdb.selector.clone(),
            policy,
        })
    }

    pub fn selects(&self, pod: &PodRequest) -> bool {
        self.selector.matches(&pod.labels)
    }

    fn permits(&self, healthy: u32, expected: u32) -> bool {
        match self.policy {
            Policy::MinAvailable(min) => healthy > min.resolve(expected),
            Policy::MaxUnavailable(max) => {
                let remaining = i64::from(healthy) - 1;
                let floor = i64::from(expected) - i64::from(max.resolve(expected));
                remaining >= floor
            }
            Policy::Unconstrained => true,
        }
    }
}

#[derive(Debug)]
struct BudgetStatus<'b> {
    budget: &'b Budget,
    healthy: u32,
    expected: u32,
}

/// Eviction decisions against the pod counts of one simulation pass
#[derive(Debug)]
pub struct EvictionGate<'b> {
    statuses: Vec<BudgetStatus<'b>>,
}

impl<'b> EvictionGate<'b> {
    /// `desired` lists each workload's pod request with the number of pods it
    /// wants running.
    pub fn new<'p>(
        budgets: &'b [Budget],
        state: &ClusterState<'_>,
        desired: impl IntoIterator<Item = (&'p PodRequest, u32)> + Clone,
    ) -> Self {
        let statuses = budgets
            .iter()
            .map(|budget| BudgetStatus {
                budget,
                healthy: state.count_matching(&budget.selector) as u32,
                expected: desired
                    .clone()
                    .into_iter()
                    .filter(|(pod, _)| budget.selects(pod))
                    .map(|(_, count)| count)
                    .sum(),
            })
            .collect();
        Self { statuses }
    }

    /// Whether every budget selecting `pod` allows it to be evicted
    pub fn can_evict(&self, pod: &PodRequest) -> bool {
        self.statuses
            .iter()
            .filter(|status| status.budget.selects(pod))
            .all(|status| status.budget.permits(status.healthy, status.expected))
    }

    /// Name of the first budget blocking `pod`, if any
    pub fn blocking(&self, pod: &PodRequest) -> Option<&'b Budget> {
        self.statuses
            .iter()
            .find(|status| {
                status.budget.selects(pod) && !status.budget.permits(status.healthy, status.expected)
            })
            .map(|status| status.budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::{Node, PodTemplate, WorkloadKey, WorkloadKind};
    use crate::scheduler::NodeId;
    use std::sync::Arc;

    fn pod(app: &str) -> Arc<PodRequest> {
        let owner = WorkloadKey {
            kind: WorkloadKind::Deployment,
            namespace: "default".to_string(),
            name: app.to_string(),
        };
        Arc::new(PodRequest::from_template(owner, &PodTemplate::default().with_label("app", app)).unwrap())
    }

    fn pdb(min: Option<IntOrPercent>, max: Option<IntOrPercent>) -> PodDisruptionBudget {
        PodDisruptionBudget {
            name: "test-pdb".to_string(),
            namespace: "default".to_string(),
            selector: LabelSelector::label("app", "test"),
            min_available: min,
            max_unavailable: max,
        }
    }

    fn with_pods<'a>(nodes: &'a [Node], pods: &[Arc<PodRequest>]) -> ClusterState<'a> {
        let mut state = ClusterState::all(nodes, SimulationConfig::default());
        for (i, pod) in pods.iter().enumerate() {
            state.commit(NodeId(i % nodes.len()), Arc::clone(pod));
        }
        state
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!(
            Threshold::parse("p", &IntOrPercent::Percent("50%".to_string())),
            Ok(Threshold::Percent(50))
        );
        assert_eq!(
            Threshold::parse("p", &IntOrPercent::Int(2)),
            Ok(Threshold::Count(2))
        );
        assert!(Threshold::parse("p", &IntOrPercent::Percent("50".to_string())).is_err());
        assert!(Threshold::parse("p", &IntOrPercent::Percent("150%".to_string())).is_err());
        assert!(Threshold::parse("p", &IntOrPercent::Percent("x%".to_string())).is_err());
    }

    #[test]
    fn test_percent_rounds_up() {
        assert_eq!(Threshold::Percent(50).resolve(3), 2);
        assert_eq!(Threshold::Percent(10).resolve(1), 1);
        assert_eq!(Threshold::Percent(0).resolve(7), 0);
        assert_eq!(Threshold::Count(4).resolve(1), 4);
    }

    #[test]
    fn test_compile_rejects_both_fields() {
        let err = Budget::compile(&pdb(Some(IntOrPercent::Int(1)), Some(IntOrPercent::Int(1)))).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidBudget { .. }));
    }

    #[test]
    fn test_min_available_blocks_at_threshold() {
        let nodes = vec![Node::new("n1", 4000, 1 << 30, 10), Node::new("n2", 4000, 1 << 30, 10)];
        let test_pod = pod("test");
        let budgets = vec![Budget::compile(&pdb(Some(IntOrPercent::Int(1)), None)).unwrap()];

        let state = with_pods(&nodes, &[test_pod.clone()]);
        let gate = EvictionGate::new(&budgets, &state, [(&*test_pod, 1)]);
        assert!(!gate.can_evict(&test_pod));
        assert_eq!(gate.blocking(&test_pod).map(|b| b.name.as_str()), Some("test-pdb"));

        let state = with_pods(&nodes, &[test_pod.clone(), test_pod.clone()]);
        let gate = EvictionGate::new(&budgets, &state, [(&*test_pod, 2)]);
        assert!(gate.can_evict(&test_pod));
    }

    #[test]
    fn test_max_unavailable() {
        let nodes = vec![Node::new("n1", 4000, 1 << 30, 10)];
        let test_pod = pod("test");
        let budgets = vec![Budget::compile(&pdb(None, Some(IntOrPercent::Int(1)))).unwrap()];

        // all 3 healthy: one may go
        let state = with_pods(&nodes, &[test_pod.clone(), test_pod.clone(), test_pod.clone()]);
        assert!(EvictionGate::new(&budgets, &state, [(&*test_pod, 3)]).can_evict(&test_pod));

        // one already missing: none may go
        let state = with_pods(&nodes, &[test_pod.clone(), test_pod.clone()]);
        assert!(!EvictionGate::new(&budgets, &state, [(&*test_pod, 3)]).can_evict(&test_pod));
    }

    #[test]
    fn test_unmatched_pods_are_always_evictable() {
        let nodes = vec![Node::new("n1", 4000, 1 << 30, 10)];
        let other = pod("other");
        let budgets = vec![Budget::compile(&pdb(Some(IntOrPercent::Int(5)), None)).unwrap()];
        let state = with_pods(&nodes, &[other.clone()]);

        assert!(EvictionGate::new(&budgets, &state, [(&*other, 1)]).can_evict(&other));
    }

    #[test]
    fn test_all_matching_budgets_must_agree() {
        let nodes = vec![Node::new("n1", 4000, 1 << 30, 10)];
        let test_pod = pod("test");
        let budgets = vec![
            Budget::compile(&pdb(None, Some(IntOrPercent::Percent("100%".to_string())))).unwrap(),
            Budget::compile(&pdb(Some(IntOrPercent::Int(2)), None)).unwrap(),
        ];
        let state = with_pods(&nodes, &[test_pod.clone(), test_pod.clone()]);

        assert!(!EvictionGate::new(&budgets, &state, [(&*test_pod, 2)]).can_evict(&test_pod));
    }
}
