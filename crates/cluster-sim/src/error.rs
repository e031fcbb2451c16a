//! Simulation error types.

use thiserror::Error;

/// Errors that abort a simulation call.
///
/// Placement infeasibility is not represented here: a pod that does not fit
/// is reported through [`crate::scheduler::FailureSummary`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid label selector in {context}: {reason}")]
    InvalidSelector { context: String, reason: String },

    #[error("invalid disruption budget {name}: {reason}")]
    InvalidBudget { name: String, reason: String },

    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("simulation task failed: {0}")]
    TaskFailed(String),
}

impl SimulationError {
    pub(crate) fn selector(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;
