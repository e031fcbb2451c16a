//! Pod placement requests derived from workload templates

use super::resources::{pod_demand, ResourceDemand};
use crate::error::{SimulationError, SimulationResult};
use crate::models::{Labels, NodeAffinity, PodAffinityTerm, PodTemplate, Toleration, WorkloadKey};

/// Everything the scheduler needs to place one pod
///
/// Built once per workload; selectors are validated at construction so
/// constraint evaluation never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct PodRequest {
    pub owner: WorkloadKey,
    pub labels: Labels,
    pub demand: ResourceDemand,
    pub tolerations: Vec<Toleration>,
    pub node_selector: Labels,
    pub node_affinity: Option<NodeAffinity>,
    pub pod_affinity: Vec<PodAffinityTerm>,
    pub pod_anti_affinity: Vec<PodAffinityTerm>,
}

impl PodRequest {
    pub fn from_template(owner: WorkloadKey, template: &PodTemplate) -> SimulationResult<Self> {
        let context = owner.to_string();
        let affinity = &template.affinity;

        if let Some(node_affinity) = &affinity.node_affinity {
            for term in &node_affinity.required_terms {
                for requirement in &term.match_expressions {
                    requirement.validate(&context)?;
                }
            }
        }

        for term in affinity.pod_affinity.iter().chain(&affinity.pod_anti_affinity) {
            if term.topology_key.is_empty() {
                return Err(SimulationError::selector(
                    &context,
                    "pod affinity term without topology key",
                ));
            }
            term.label_selector.validate(&context)?;
        }

        Ok(Self {
            owner,
            labels: template.labels.clone(),
            demand: pod_demand(template),
            tolerations: template.tolerations.clone(),
            node_selector: template.node_selector.clone(),
            node_affinity: affinity.node_affinity.clone(),
            pod_affinity: affinity.pod_affinity.clone(),
            pod_anti_affinity: affinity.pod_anti_affinity.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Container, NodeSelectorTerm, WorkloadKind};
    use crate::selector::{LabelSelector, SelectorOperator, SelectorRequirement};

    fn owner() -> WorkloadKey {
        WorkloadKey {
            kind: WorkloadKind::Deployment,
            namespace: "default".to_string(),
            name: "web".to_string(),
        }
    }

    #[test]
    fn test_builds_demand_and_labels() {
        let template = PodTemplate::default()
            .with_label("app", "web")
            .with_container(Container::with_requests("c", 500, 1024));

        let request = PodRequest::from_template(owner(), &template).unwrap();

        assert_eq!(request.demand, ResourceDemand::new(500, 1024));
        assert_eq!(request.labels.get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_rejects_malformed_node_affinity() {
        let mut template = PodTemplate::default();
        template.affinity.node_affinity = Some(NodeAffinity {
            required_terms: vec![NodeSelectorTerm {
                match_expressions: vec![SelectorRequirement::new(
                    "zone",
                    SelectorOperator::NotIn,
                    Vec::<String>::new(),
                )],
            }],
        });

        let err = PodRequest::from_template(owner(), &template).unwrap_err();
        assert!(err.to_string().contains("deployment default/web"));
    }

    #[test]
    fn test_rejects_missing_topology_key() {
        let mut template = PodTemplate::default();
        template.affinity.pod_anti_affinity = vec![PodAffinityTerm {
            label_selector: LabelSelector::label("app", "web"),
            topology_key: String::new(),
        }];

        assert!(matches!(
            PodRequest::from_template(owner(), &template),
            Err(SimulationError::InvalidSelector { .. })
        ));
    }
}
