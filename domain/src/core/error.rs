//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown coordination strategy: {0}")]
    CoordinationStrategyUnknown(String),

    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("Dependency cycle detected among steps: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Joint intervention requires at least 2 agents, got {0}")]
    InsufficientParticipants(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl DomainError {
    /// Whether this error comes from a malformed dependency graph
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            DomainError::CycleDetected(_) | DomainError::UnknownDependency { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_lists_steps() {
        let error = DomainError::CycleDetected(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(error.to_string(), "Dependency cycle detected among steps: a, b");
    }

    #[test]
    fn test_is_graph_error() {
        assert!(DomainError::CycleDetected(vec![]).is_graph_error());
        assert!(
            DomainError::UnknownDependency {
                step: "s1".to_string(),
                dependency: "s9".to_string()
            }
            .is_graph_error()
        );
        assert!(!DomainError::InsufficientParticipants(1).is_graph_error());
        assert!(!DomainError::CoordinationStrategyUnknown("x".to_string()).is_graph_error());
    }
}
