//! Bin-packing scheduler
//!
//! Turns workloads into pod requests and places them onto an allocation
//! overlay, honoring headroom, taints, node affinity, pod (anti-)affinity
//! and node selectors.

mod constraints;
mod expander;
mod placement;
mod reason;
mod request;
mod resources;
mod state;


pub use constraints::can_place;
pub use expander::{expand, Expansion, PlannedWorkload};
pub use placement::Scheduler;
pub use reason::{FailureSummary, Unschedulable};
pub use request::PodRequest;
pub use resources::{pod_demand, ResourceDemand};
pub use state::{ClusterState, NodeAllocation, NodeId, NodeLimits};
