//! Errors raised by agent logic and the agent envelope.

use crate::ports::llm_gateway::GatewayError;
use council_domain::AgentType;
use std::time::Duration;
use thiserror::Error;

/// Failure inside an agent's own logic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of one call through an agent envelope.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Agent {agent} is at capacity ({max} concurrent sessions)")]
    CapacityExceeded { agent: AgentType, max: usize },

    #[error("Circuit breaker open for agent {agent}, retry after {retry_after:?}")]
    CircuitBreakerOpen {
        agent: AgentType,
        retry_after: Duration,
    },

    #[error("Agent {agent} timed out after {after:?}")]
    Timeout { agent: AgentType, after: Duration },

    #[error("Agent {0} is shut down")]
    Shutdown(AgentType),

    #[error("Agent logic failed: {0}")]
    Logic(#[from] AgentError),
}

impl RuntimeError {
    /// Whether the call was refused before any work started.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RuntimeError::CapacityExceeded { .. }
                | RuntimeError::CircuitBreakerOpen { .. }
                | RuntimeError::Shutdown(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_converts_through_logic() {
        let err: RuntimeError = AgentError::from(GatewayError::Timeout).into();
        assert!(matches!(err, RuntimeError::Logic(AgentError::Gateway(GatewayError::Timeout))));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_rejections() {
        let err = RuntimeError::CapacityExceeded {
            agent: AgentType::Intake,
            max: 2,
        };
        assert!(err.is_rejection());
        assert!(err.to_string().contains("intake"));
        assert!(RuntimeError::Shutdown(AgentType::Coordination).is_rejection());
    }
}
