//! Core data models for the scheduling simulator

use crate::quantity;
use crate::selector::{LabelSelector, SelectorRequirement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label map shared by nodes, pod templates and selectors
pub type Labels = BTreeMap<String, String>;

/// Worker node as reported by cluster introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Allocatable CPU in millicores
    #[serde(rename = "cpu", with = "node_cpu")]
    pub cpu_millis: u64,
    /// Allocatable memory in bytes
    #[serde(rename = "memory", with = "node_memory")]
    pub memory_bytes: u64,
    pub max_pods: u32,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub labels: Labels,
}

impl Node {
    pub fn new(name: impl Into<String>, cpu_millis: u64, memory_bytes: u64, max_pods: u32) -> Self {
        Self {
            name: name.into(),
            cpu_millis,
            memory_bytes,
            max_pods,
            taints: Vec::new(),
            labels: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_taint(mut self, taint: Taint) -> Self {
        self.taints.push(taint);
        self
    }
}

// Node capacity is mandatory, so wrap the optional quantity adapters.
mod node_cpu {
    use serde::{de::Error, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        crate::quantity::cpu::serialize(&Some(*value), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        crate::quantity::cpu::deserialize(deserializer)?
            .ok_or_else(|| D::Error::custom("node cpu capacity is required"))
    }
}

mod node_memory {
    use serde::{de::Error, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        crate::quantity::memory::serialize(&Some(*value), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        crate::quantity::memory::deserialize(deserializer)?
            .ok_or_else(|| D::Error::custom("node memory capacity is required"))
    }
}

/// Taint effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    /// Soft preference, never blocks placement
    PreferNoSchedule,
    NoExecute,
}

/// Node-side exclusion marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: TaintEffect,
}

impl Taint {
    pub fn new(key: impl Into<String>, value: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            effect,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    #[default]
    Equal,
    Exists,
}

/// Pod-side override permitting placement on a tainted node
///
/// An empty key tolerates every taint; a missing effect tolerates every effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: TolerationOperator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub effect: Option<TaintEffect>,
}

impl Toleration {
    pub fn equal(key: impl Into<String>, value: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Equal,
            value: value.into(),
            effect: Some(effect),
        }
    }

    pub fn exists(key: impl Into<String>, effect: Option<TaintEffect>) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Exists,
            value: String::new(),
            effect,
        }
    }

    /// Whether this toleration covers the given taint
    pub fn tolerates(&self, taint: &Taint) -> bool {
        let effect_matches = self.effect.map_or(true, |effect| effect == taint.effect);
        if !effect_matches {
            return false;
        }
        if self.key.is_empty() {
            return true;
        }
        if self.key != taint.key {
            return false;
        }
        match self.operator {
            TolerationOperator::Exists => true,
            TolerationOperator::Equal => self.value == taint.value,
        }
    }
}

/// Resource amounts for a container; absent entries count as zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(rename = "cpu", default, with = "quantity::cpu", skip_serializing_if = "Option::is_none")]
    pub cpu_millis: Option<u64>,
    #[serde(rename = "memory", default, with = "quantity::memory", skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: ResourceList,
    #[serde(default)]
    pub limits: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl Container {
    /// Container requesting the given CPU millicores and memory bytes
    pub fn with_requests(name: impl Into<String>, cpu_millis: u64, memory_bytes: u64) -> Self {
        Self {
            name: name.into(),
            resources: ResourceRequirements {
                requests: ResourceList {
                    cpu_millis: Some(cpu_millis),
                    memory_bytes: Some(memory_bytes),
                },
                limits: ResourceList::default(),
            },
        }
    }
}

/// OR-ed list of node selector terms; each term ANDs its expressions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAffinity {
    #[serde(default)]
    pub required_terms: Vec<NodeSelectorTerm>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelectorTerm {
    #[serde(default)]
    pub match_expressions: Vec<SelectorRequirement>,
}

/// Required pod (anti-)affinity term scoped by a topology key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodAffinityTerm {
    pub label_selector: LabelSelector,
    pub topology_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affinity {
    #[serde(default)]
    pub node_affinity: Option<NodeAffinity>,
    #[serde(default)]
    pub pod_affinity: Vec<PodAffinityTerm>,
    #[serde(default)]
    pub pod_anti_affinity: Vec<PodAffinityTerm>,
}

/// Pod template carried by every workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub init_containers: Vec<Container>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
    #[serde(default)]
    pub node_selector: Labels,
    #[serde(default)]
    pub affinity: Affinity,
}

impl PodTemplate {
    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Workload kind, ordered by replay order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    DaemonSet,
    Deployment,
    Job,
    StatefulSet,
    Pod,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkloadKind::DaemonSet => "daemonset",
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::Job => "job",
            WorkloadKind::StatefulSet => "statefulset",
            WorkloadKind::Pod => "pod",
        };
        f.write_str(name)
    }
}

/// Fan-out rule of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkloadSpec {
    /// One pod per eligible node
    DaemonSet,
    Deployment {
        #[serde(default = "default_replicas")]
        replicas: u32,
    },
    Job {
        #[serde(default = "default_replicas")]
        completions: u32,
    },
    StatefulSet {
        #[serde(default = "default_replicas")]
        replicas: u32,
    },
    /// Exactly one pod
    Pod,
}

fn default_replicas() -> u32 {
    1
}

impl WorkloadSpec {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            WorkloadSpec::DaemonSet => WorkloadKind::DaemonSet,
            WorkloadSpec::Deployment { .. } => WorkloadKind::Deployment,
            WorkloadSpec::Job { .. } => WorkloadKind::Job,
            WorkloadSpec::StatefulSet { .. } => WorkloadKind::StatefulSet,
            WorkloadSpec::Pod => WorkloadKind::Pod,
        }
    }
}

/// Identity of a registered workload; ordering is the replay order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkloadKey {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A workload discovered in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(flatten)]
    pub spec: WorkloadSpec,
    pub template: PodTemplate,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Workload {
    pub fn new(name: impl Into<String>, spec: WorkloadSpec, template: PodTemplate) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            spec,
            template,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn key(&self) -> WorkloadKey {
        WorkloadKey {
            kind: self.spec.kind(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// Integer or percentage threshold of a disruption budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrPercent {
    Int(u32),
    Percent(String),
}

/// Pod disruption budget, applied to every pod its selector matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDisruptionBudget {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub selector: LabelSelector,
    #[serde(default)]
    pub min_available: Option<IntOrPercent>,
    #[serde(default)]
    pub max_unavailable: Option<IntOrPercent>,
}

impl PodDisruptionBudget {
    pub fn min_available(name: impl Into<String>, selector: LabelSelector, count: u32) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            selector,
            min_available: Some(IntOrPercent::Int(count)),
            max_unavailable: None,
        }
    }

    pub fn max_unavailable(name: impl Into<String>, selector: LabelSelector, count: u32) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            selector,
            min_available: None,
            max_unavailable: Some(IntOrPercent::Int(count)),
        }
    }

    /// Registration key: namespace/name
    pub fn key(&self) -> (String, String) {
        (self.namespace.clone(), self.name.clone())
    }
}

/// Everything a simulation consumes, as loaded from a snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub pdbs: Vec<PodDisruptionBudget>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toleration_matching() {
        let taint = Taint::new("dedicated", "gpu", TaintEffect::NoSchedule);

        assert!(Toleration::equal("dedicated", "gpu", TaintEffect::NoSchedule).tolerates(&taint));
        assert!(Toleration::exists("dedicated", Some(TaintEffect::NoSchedule)).tolerates(&taint));
        assert!(Toleration::exists("", None).tolerates(&taint));
        assert!(!Toleration::equal("dedicated", "cpu", TaintEffect::NoSchedule).tolerates(&taint));
        assert!(!Toleration::equal("other", "gpu", TaintEffect::NoSchedule).tolerates(&taint));
        assert!(!Toleration::equal("dedicated", "gpu", TaintEffect::NoExecute).tolerates(&taint));
    }

    #[test]
    fn test_workload_key_orders_by_replay_kind() {
        let ds = Workload::new("z", WorkloadSpec::DaemonSet, PodTemplate::default()).key();
        let deploy = Workload::new("a", WorkloadSpec::Deployment { replicas: 1 }, PodTemplate::default()).key();
        let pod = Workload::new("a", WorkloadSpec::Pod, PodTemplate::default()).key();

        assert!(ds < deploy);
        assert!(deploy < pod);
        assert_eq!(deploy.to_string(), "deployment default/a");
    }

    #[test]
    fn test_replica_counts_default_to_one() {
        let json = r#"[
            {"kind": "Deployment", "name": "web", "template": {}},
            {"kind": "Job", "name": "batch", "template": {}},
            {"kind": "StatefulSet", "name": "db", "template": {}}
        ]"#;

        let workloads: Vec<Workload> = serde_json::from_str(json).unwrap();

        assert_eq!(workloads[0].spec, WorkloadSpec::Deployment { replicas: 1 });
        assert_eq!(workloads[1].spec, WorkloadSpec::Job { completions: 1 });
        assert_eq!(workloads[2].spec, WorkloadSpec::StatefulSet { replicas: 1 });
    }

    #[test]
    fn test_snapshot_deserialization() {
        let json = r#"{
            "nodes": [
                {"name": "n1", "cpu": 4, "memory": "8Gi", "max_pods": 110,
                 "labels": {"zone": "a"},
                 "taints": [{"key": "dedicated", "value": "gpu", "effect": "NoSchedule"}]}
            ],
            "workloads": [
                {"kind": "Deployment", "name": "web", "replicas": 3,
                 "template": {"labels": {"app": "web"},
                              "containers": [{"name": "c", "resources": {"requests": {"cpu": "500m", "memory": "1Gi"}}}]}},
                {"kind": "DaemonSet", "name": "agent", "namespace": "kube-system", "template": {}}
            ],
            "pdbs": [
                {"name": "web", "selector": {"match_labels": {"app": "web"}}, "min_available": "50%"}
            ]
        }"#;

        let snapshot: ClusterSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.nodes[0].cpu_millis, 4000);
        assert_eq!(snapshot.nodes[0].memory_bytes, 8 << 30);
        assert_eq!(snapshot.nodes[0].taints.len(), 1);
        assert_eq!(snapshot.workloads[0].spec, WorkloadSpec::Deployment { replicas: 3 });
        assert_eq!(
            snapshot.workloads[0].template.containers[0].resources.requests.cpu_millis,
            Some(500)
        );
        assert_eq!(snapshot.workloads[1].spec, WorkloadSpec::DaemonSet);
        assert_eq!(snapshot.workloads[1].namespace, "kube-system");
        assert_eq!(
            snapshot.pdbs[0].min_available,
            Some(IntOrPercent::Percent("50%".to_string()))
        );
    }
}
