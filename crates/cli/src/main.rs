//! Kube Reduce CLI
//!
//! Loads a cluster snapshot (nodes, workloads, disruption budgets) and
//! reports which nodes could be drained and removed.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{nodes, simulate};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Kube Reduce CLI
#[derive(Parser)]
#[command(name = "kube-reduce")]
#[command(author, version, about = "Simulate cluster node reduction", long_about = None)]
pub struct Cli {
    /// Cluster snapshot file (JSON with nodes, workloads and pdbs)
    #[arg(long, short, env = "KUBE_REDUCE_INPUT")]
    pub input: PathBuf,

    /// Config file (defaults to ~/.config/kube-reduce/config.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find every node that can be removed, in removal order
    Simulate,

    /// Show per-node utilization after placing all workloads
    Utilization,

    /// Check whether a single node can be drained
    CheckNode {
        /// Node name
        node: String,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let layer = fmt::layer().with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry().with(filter).with(layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::CliConfig::load(cli.config.as_deref())?;
    debug!(cluster = %config.cluster_name, input = %cli.input.display(), "Configuration loaded");

    let service = commands::load_service(&cli.input, &config).await?;

    match cli.command {
        Commands::Simulate => simulate::simulate(&service, cli.format).await?,
        Commands::Utilization => nodes::show_utilization(&service, cli.format).await?,
        Commands::CheckNode { node } => nodes::check_node(&service, &node, cli.format).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
