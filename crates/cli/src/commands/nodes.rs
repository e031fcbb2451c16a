//! Per-node commands

use anyhow::Result;
use cluster_sim::SchedulingService;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_utilization, print_json, print_success, print_table, print_warning, OutputFormat,
};

/// Row for the utilization table
#[derive(Tabled)]
struct UtilizationRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Pods")]
    pods: String,
}

#[derive(Serialize)]
struct RemovalCheck<'a> {
    node: &'a str,
    removable: bool,
}

/// Show baseline utilization for every node
pub async fn show_utilization(service: &SchedulingService, format: OutputFormat) -> Result<()> {
    let utilization = service.utilization().await?;

    match format {
        OutputFormat::Json => print_json(&utilization)?,
        OutputFormat::Table => {
            let config = service.config();
            let rows: Vec<UtilizationRow> = utilization
                .iter()
                .map(|(node, usage)| UtilizationRow {
                    node: node.clone(),
                    cpu: color_utilization(usage.cpu_ratio, config.cpu_headroom),
                    memory: color_utilization(usage.memory_ratio, config.memory_headroom),
                    pods: color_utilization(usage.pod_ratio, config.pod_headroom),
                })
                .collect();
            print_table(&rows, "No nodes registered");
        }
    }

    Ok(())
}

/// Check whether a single node could be drained
pub async fn check_node(service: &SchedulingService, node: &str, format: OutputFormat) -> Result<()> {
    let removable = service.can_remove_node(node).await?;

    match format {
        OutputFormat::Json => print_json(&RemovalCheck { node, removable })?,
        OutputFormat::Table => {
            if removable {
                print_success(&format!("Node {} can be removed", node));
            } else {
                print_warning(&format!("Node {} cannot be removed", node));
            }
        }
    }

    Ok(())
}
