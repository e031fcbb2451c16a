//! Workload expansion into individual pod placements

use super::placement::Scheduler;
use super::reason::FailureSummary;
use super::request::PodRequest;
use super::state::NodeId;
use crate::error::SimulationResult;
use crate::models::{Workload, WorkloadKey, WorkloadSpec};
use std::sync::Arc;

/// A registered workload with its pod request compiled
#[derive(Debug, Clone)]
pub struct PlannedWorkload {
    pub key: WorkloadKey,
    pub spec: WorkloadSpec,
    pub pod: Arc<PodRequest>,
}

impl PlannedWorkload {
    pub fn compile(workload: &Workload) -> SimulationResult<Self> {
        let key = workload.key();
        let pod = PodRequest::from_template(key.clone(), &workload.template)?;
        Ok(Self {
            key,
            spec: workload.spec,
            pod: Arc::new(pod),
        })
    }

    /// Pods this workload wants running, given how many an expansion placed.
    /// Daemon sets want exactly the nodes that accepted them.
    pub fn desired_pods(&self, placed: u32) -> u32 {
        match self.spec {
            WorkloadSpec::DaemonSet => placed,
            WorkloadSpec::Deployment { replicas } | WorkloadSpec::StatefulSet { replicas } => replicas,
            WorkloadSpec::Job { completions } => completions,
            WorkloadSpec::Pod => 1,
        }
    }
}

/// Outcome of expanding one workload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Placement attempts made (nodes visited for daemon sets)
    pub requested: u32,
    pub placed: u32,
    /// Nodes a daemon set skipped, by reason
    pub skipped: FailureSummary,
    /// Why the first unplaceable replica failed
    pub failure: Option<FailureSummary>,
}

impl Expansion {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Place every pod `workload` implies
///
/// Replicated kinds stop at the first replica that does not fit; replicas
/// placed before it stay committed.
pub fn expand(scheduler: &mut Scheduler<'_>, workload: &PlannedWorkload) -> Expansion {
    match workload.spec {
        WorkloadSpec::DaemonSet => expand_daemon_set(scheduler, &workload.pod),
        WorkloadSpec::Deployment { replicas } | WorkloadSpec::StatefulSet { replicas } => {
            expand_replicas(scheduler, &workload.pod, replicas)
        }
        WorkloadSpec::Job { completions } => expand_replicas(scheduler, &workload.pod, completions),
        WorkloadSpec::Pod => expand_replicas(scheduler, &workload.pod, 1),
    }
}

fn expand_daemon_set(scheduler: &mut Scheduler<'_>, pod: &Arc<PodRequest>) -> Expansion {
    let ids: Vec<NodeId> = scheduler.state().ids().collect();
    let mut expansion = Expansion {
        requested: ids.len() as u32,
        ..Expansion::default()
    };

    for id in ids {
        match scheduler.place_on(pod, id) {
            Ok(()) => expansion.placed += 1,
            Err(reason) => expansion.skipped.record(reason),
        }
    }
    expansion
}

fn expand_replicas(scheduler: &mut Scheduler<'_>, pod: &Arc<PodRequest>, count: u32) -> Expansion {
    let mut expansion = Expansion {
        requested: count,
        ..Expansion::default()
    };

    for _ in 0..count {
        match scheduler.place(pod) {
            Ok(_) => expansion.placed += 1,
            Err(failures) => {
                expansion.failure = Some(failures);
                break;
            }
        }
    }
    expansion
}
