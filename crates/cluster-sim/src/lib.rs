//! Cluster bin-packing scheduling simulator
//!
//! This crate provides the core functionality for:
//! - Replaying workloads onto nodes with scheduler semantics
//!   (headroom, taints, node and pod affinity, node selectors)
//! - Disruption-budget aware eviction checks
//! - Searching for nodes that can be drained and removed
//! - A concurrent registration service and observability

pub mod config;
pub mod error;
pub mod eviction;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod reduction;
pub mod report;
pub mod scheduler;
pub mod selector;
pub mod service;

pub use config::SimulationConfig;
pub use error::{SimulationError, SimulationResult};
pub use models::*;
pub use observability::{SimulationMetrics, StructuredLogger};
pub use reduction::{find_removable_nodes, ClusterReduction};
pub use report::{NodeUtilization, ReductionReport, UnschedulableWorkload};
pub use selector::{LabelSelector, SelectorOperator, SelectorRequirement};
pub use service::{RegistryStats, SchedulingService};
