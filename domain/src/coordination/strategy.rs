//! Coordination strategy value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the agents of one coordination round run relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    /// Steps in ascending order, each seeing the previous outputs
    Sequential,
    /// All agents at once, failures isolated
    Parallel,
    /// Crisis-safety first, the rest only if it does not escalate
    Hierarchical,
    /// Two parallel rounds, the second seeing all first-round outputs
    Consensus,
}

impl CoordinationStrategy {
    pub const ALL: [CoordinationStrategy; 4] = [
        CoordinationStrategy::Sequential,
        CoordinationStrategy::Parallel,
        CoordinationStrategy::Hierarchical,
        CoordinationStrategy::Consensus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationStrategy::Sequential => "sequential",
            CoordinationStrategy::Parallel => "parallel",
            CoordinationStrategy::Hierarchical => "hierarchical",
            CoordinationStrategy::Consensus => "consensus",
        }
    }

    /// Number of dispatch rounds the strategy performs.
    pub fn rounds(&self) -> u32 {
        match self {
            CoordinationStrategy::Consensus => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for CoordinationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CoordinationStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "seq" => Ok(CoordinationStrategy::Sequential),
            "parallel" | "par" => Ok(CoordinationStrategy::Parallel),
            "hierarchical" | "priority" => Ok(CoordinationStrategy::Hierarchical),
            "consensus" => Ok(CoordinationStrategy::Consensus),
            _ => Err(DomainError::CoordinationStrategyUnknown(s.to_string())),
        }
    }
}
