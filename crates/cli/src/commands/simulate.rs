//! Cluster reduction simulation

use anyhow::Result;
use cluster_sim::SchedulingService;
use colored::Colorize;
use tabled::Tabled;

use crate::output::{
    format_bytes, format_cpu, format_timestamp, print_info, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

/// Row for the removable nodes table
#[derive(Tabled)]
struct RemovableNodeRow {
    #[tabled(rename = "Order")]
    order: usize,
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Max Pods")]
    max_pods: u32,
}

/// Row for the unschedulable workloads table
#[derive(Tabled)]
struct UnschedulableRow {
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Placed")]
    placed: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Run the reduction search and print removable nodes
pub async fn simulate(service: &SchedulingService, format: OutputFormat) -> Result<()> {
    let report = service.report().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let nodes = service.snapshot().await.nodes;

            println!("{}", "Cluster Reduction".bold());
            println!("{}", "=".repeat(50));

            let rows: Vec<RemovableNodeRow> = report
                .removable_nodes
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    nodes.iter().find(|n| &n.name == name).map(|node| RemovableNodeRow {
                        order: i + 1,
                        name: node.name.clone(),
                        cpu: format_cpu(node.cpu_millis),
                        memory: format_bytes(node.memory_bytes),
                        max_pods: node.max_pods,
                    })
                })
                .collect();
            print_table(&rows, "No nodes can be removed");

            if !report.unschedulable.is_empty() {
                println!();
                print_warning("Some workloads do not fit the current cluster");
                let rows: Vec<UnschedulableRow> = report
                    .unschedulable
                    .iter()
                    .map(|w| UnschedulableRow {
                        workload: w.workload.to_string(),
                        placed: format!("{}/{}", w.placed, w.requested),
                        reason: w.reason.clone(),
                    })
                    .collect();
                print_table(&rows, "");
            }

            println!();
            if report.removable_nodes.is_empty() {
                print_info(&format!("All {} nodes are needed", report.total_nodes));
            } else {
                print_success(&format!(
                    "{} of {} nodes can be removed ({} remaining)",
                    report.removable_nodes.len(),
                    report.total_nodes,
                    report.remaining_nodes()
                ));
            }
            println!(
                "Generated: {}",
                format_timestamp(report.generated_at).dimmed()
            );
        }
    }

    Ok(())
}
