//! Coordination errors.

use council_domain::{AgentType, DomainError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinationError {
    #[error("Unknown coordination strategy: {0}")]
    StrategyUnknown(String),

    #[error("Agent {0} is not registered")]
    AgentUnavailable(AgentType),

    #[error("Step for agent {agent} failed: {error}")]
    StepFailed { agent: AgentType, error: String },

    #[error("No agent produced a result")]
    NoResults,

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

impl From<DomainError> for CoordinationError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::CoordinationStrategyUnknown(name) => CoordinationError::StrategyUnknown(name),
            other => CoordinationError::InvalidPlan(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategy_maps() {
        let err: CoordinationError = DomainError::CoordinationStrategyUnknown("round_robin".into()).into();
        assert_eq!(err, CoordinationError::StrategyUnknown("round_robin".to_string()));
    }
}
