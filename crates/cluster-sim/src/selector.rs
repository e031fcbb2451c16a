//! Label selectors
//!
//! Matching is infallible; malformed selectors are rejected up front by
//! [`LabelSelector::validate`] so a simulation aborts before placing anything.

use crate::error::{SimulationError, SimulationResult};
use crate::models::Labels;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Single `key <op> values` expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    pub fn new<I, S>(key: impl Into<String>, operator: SelectorOperator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self, context: &str) -> SimulationResult<()> {
        if self.key.is_empty() {
            return Err(SimulationError::selector(context, "empty key"));
        }
        match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn if self.values.is_empty() => {
                Err(SimulationError::selector(
                    context,
                    format!("{:?} on key {:?} requires values", self.operator, self.key),
                ))
            }
            SelectorOperator::Exists | SelectorOperator::DoesNotExist if !self.values.is_empty() => {
                Err(SimulationError::selector(
                    context,
                    format!("{:?} on key {:?} takes no values", self.operator, self.key),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            SelectorOperator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// Equality labels AND-ed with set-based expressions
///
/// An empty selector matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: Labels,
    #[serde(default)]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    /// Selector requiring a single `key=value` label
    pub fn label(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut match_labels = Labels::new();
        match_labels.insert(key.into(), value.into());
        Self {
            match_labels,
            match_expressions: Vec::new(),
        }
    }

    pub fn with_expression(mut self, requirement: SelectorRequirement) -> Self {
        self.match_expressions.push(requirement);
        self
    }

    pub fn validate(&self, context: &str) -> SimulationResult<()> {
        if self.match_labels.keys().any(String::is_empty) {
            return Err(SimulationError::selector(context, "empty key in match_labels"));
        }
        self.match_expressions
            .iter()
            .try_for_each(|requirement| requirement.validate(context))
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
            && self.match_expressions.iter().all(|r| r.matches(labels))
    }
}
