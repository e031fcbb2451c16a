//! Placement failure reasons

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a single node rejected a pod
///
/// Variant order is the evaluation order of the constraint checks and the
/// order reasons are listed in a [`FailureSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unschedulable {
    NotEnoughCpu,
    NotEnoughMemory,
    NotEnoughPods,
    NotTolerated,
    NodeAffinityUnsatisfied,
    AffinityUnsatisfied,
    NodeSelectorKeyMissing,
    NodeSelectorValueMismatch,
}

impl fmt::Display for Unschedulable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Unschedulable::NotEnoughCpu => "not enough cpu",
            Unschedulable::NotEnoughMemory => "not enough memory",
            Unschedulable::NotEnoughPods => "not enough pods",
            Unschedulable::NotTolerated => "not tolerated",
            Unschedulable::NodeAffinityUnsatisfied => "node affinity unsatisfied",
            Unschedulable::AffinityUnsatisfied => "pod affinity unsatisfied",
            Unschedulable::NodeSelectorKeyMissing => "node selector key missing",
            Unschedulable::NodeSelectorValueMismatch => "node selector value mismatch",
        };
        f.write_str(text)
    }
}

/// Per-reason count of nodes that rejected a pod
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSummary {
    counts: BTreeMap<Unschedulable, usize>,
}

impl FailureSummary {
    pub fn record(&mut self, reason: Unschedulable) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    pub fn count(&self, reason: Unschedulable) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    /// Number of node rejections recorded
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn reasons(&self) -> impl Iterator<Item = (Unschedulable, usize)> + '_ {
        self.counts.iter().map(|(reason, count)| (*reason, *count))
    }
}

impl fmt::Display for FailureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("no nodes available");
        }
        for (i, (reason, count)) in self.reasons().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let noun = if count == 1 { "node" } else { "nodes" };
            write!(f, "{} on {} {}", reason, count, noun)?;
        }
        Ok(())
    }
}
