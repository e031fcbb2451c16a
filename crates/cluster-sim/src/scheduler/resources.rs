//! Effective pod resource demand
//!
//! Regular containers run side by side, so their requests add up. Init
//! containers run one at a time before them, so only the largest counts.
//! Each dimension takes the larger of the two independently.

use crate::models::{Container, PodTemplate};
use serde::{Deserialize, Serialize};

/// CPU and memory a pod needs on its node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDemand {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
}

impl ResourceDemand {
    pub fn new(cpu_millis: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
        }
    }

    fn of_container(container: &Container) -> Self {
        let requests = &container.resources.requests;
        Self {
            cpu_millis: requests.cpu_millis.unwrap_or(0),
            memory_bytes: requests.memory_bytes.unwrap_or(0),
        }
    }

    fn plus(self, other: Self) -> Self {
        Self {
            cpu_millis: self.cpu_millis.saturating_add(other.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
        }
    }

    fn max(self, other: Self) -> Self {
        Self {
            cpu_millis: self.cpu_millis.max(other.cpu_millis),
            memory_bytes: self.memory_bytes.max(other.memory_bytes),
        }
    }
}

/// Compute the demand of a pod built from `template`
pub fn pod_demand(template: &PodTemplate) -> ResourceDemand {
    let regular = template
        .containers
        .iter()
        .map(ResourceDemand::of_container)
        .fold(ResourceDemand::default(), ResourceDemand::plus);

    let init = template
        .init_containers
        .iter()
        .map(ResourceDemand::of_container)
        .fold(ResourceDemand::default(), ResourceDemand::max);

    regular.max(init)
}
