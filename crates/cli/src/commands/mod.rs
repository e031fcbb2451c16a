//! CLI subcommands

pub mod nodes;
pub mod simulate;

use crate::config::CliConfig;
use anyhow::{Context, Result};
use cluster_sim::{ClusterSnapshot, SchedulingService};
use std::path::Path;

/// Read a cluster snapshot file and register it into a fresh service
pub async fn load_service(input: &Path, config: &CliConfig) -> Result<SchedulingService> {
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read snapshot {}", input.display()))?;
    let snapshot: ClusterSnapshot =
        serde_json::from_str(&content).context("Failed to parse cluster snapshot")?;

    let service = SchedulingService::new(config.cluster_name.clone(), config.simulation());
    service.load_snapshot(snapshot).await;
    Ok(service)
}
