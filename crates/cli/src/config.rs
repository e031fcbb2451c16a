//! Configuration management for the CLI
//!
//! Sources, lowest precedence first: built-in defaults, the config file
//! (`--config`, else `~/.config/kube-reduce/config.toml` when present),
//! then `KUBE_REDUCE_*` environment variables.

use anyhow::{Context, Result};
use cluster_sim::config::{DEFAULT_CPU_HEADROOM, DEFAULT_MEMORY_HEADROOM, DEFAULT_POD_HEADROOM};
use cluster_sim::SimulationConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "KUBE_REDUCE";

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Name attached to log events and metrics
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    #[serde(default = "default_cpu_headroom")]
    pub cpu_headroom: f64,

    #[serde(default = "default_memory_headroom")]
    pub memory_headroom: f64,

    #[serde(default = "default_pod_headroom")]
    pub pod_headroom: f64,

    #[serde(default)]
    pub skip_daemon_set_pods: bool,
}

fn default_cluster_name() -> String {
    "default".to_string()
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

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            cpu_headroom: default_cpu_headroom(),
            memory_headroom: default_memory_headroom(),
            pod_headroom: default_pod_headroom(),
            skip_daemon_set_pods: false,
        }
    }
}

impl CliConfig {
    /// Load configuration; an explicit `path` must exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Simulation tunables carried by this configuration
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            cpu_headroom: self.cpu_headroom,
            memory_headroom: self.memory_headroom,
            pod_headroom: self.pod_headroom,
            skip_daemon_set_pods: self.skip_daemon_set_pods,
        }
    }

    fn default_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("kube-reduce").join("config.toml"))
    }
}
