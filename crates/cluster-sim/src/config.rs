//! Simulation configuration

use crate::error::{SimulationError, SimulationResult};
use serde::{Deserialize, Serialize};

/// Share of node CPU usable by simulated workloads
pub const DEFAULT_CPU_HEADROOM: f64 = 0.85;

/// Share of node memory usable by simulated workloads
pub const DEFAULT_MEMORY_HEADROOM: f64 = 0.85;

/// Share of the node pod limit usable by simulated workloads
pub const DEFAULT_POD_HEADROOM: f64 = 0.95;

/// Tunables for a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_cpu_headroom")]
    pub cpu_headroom: f64,

    #[serde(default = "default_memory_headroom")]
    pub memory_headroom: f64,

    #[serde(default = "default_pod_headroom")]
    pub pod_headroom: f64,

    /// Leave daemon set pods behind when draining a node instead of
    /// re-placing them elsewhere
    #[serde(default)]
    pub skip_daemon_set_pods: bool,
}

fn default_cpu_headroom() -> f64 {
    DEFAULT_CPU_HEADROOM
}

fn default_memory_headroom() -> f64 {
    DEFAULT_MEMORY_HEADROOM
}

fn default_pod_headroom() -> f64 {
    DEFAULT_POD_HEADROOM
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cpu_headroom: DEFAULT_CPU_HEADROOM,
            memory_headroom: DEFAULT_MEMORY_HEADROOM,
            pod_headroom: DEFAULT_POD_HEADROOM,
            skip_daemon_set_pods: false,
        }
    }
}

impl SimulationConfig {
    /// Headroom factors must lie in (0, 1]
    pub fn validate(&self) -> SimulationResult<()> {
        for (name, value) in [
            ("cpu_headroom", self.cpu_headroom),
            ("memory_headroom", self.memory_headroom),
            ("pod_headroom", self.pod_headroom),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(SimulationError::InvalidConfig(format!(
                    "{} must be within (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
