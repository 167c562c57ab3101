//! Collaboration errors.

use crate::runtime::RuntimeError;
use council_domain::{AgentType, DomainError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaborationError {
    #[error("Quality gate '{gate}' failed with score {score:.2}")]
    QualityGateFailure { gate: String, score: f64 },

    #[error("Handoff {session_id} failed at step '{step}': {reason}")]
    HandoffFailure {
        session_id: String,
        step: String,
        reason: String,
    },

    #[error("Dependency cycle detected among steps: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Joint intervention requires at least 2 agents, got {0}")]
    InsufficientParticipants(usize),

    #[error("Collaboration session not found: {0}")]
    SessionNotFound(String),

    #[error("Agent {0} is not registered")]
    AgentNotRegistered(AgentType),

    #[error("No supervision protocol available for: {0}")]
    SupervisionUnavailable(String),

    #[error("Invalid collaboration plan: {0}")]
    InvalidPlan(String),
}

impl From<DomainError> for CollaborationError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::CycleDetected(steps) => CollaborationError::CycleDetected(steps),
            DomainError::UnknownDependency { step, dependency } => {
                CollaborationError::UnknownDependency { step, dependency }
            }
            DomainError::InsufficientParticipants(n) => CollaborationError::InsufficientParticipants(n),
            other => CollaborationError::InvalidPlan(other.to_string()),
        }
    }
}

/// Why a single handoff step attempt failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("agent {0} is not registered")]
    AgentMissing(AgentType),

    #[error("no hook registered as '{0}'")]
    UnknownHook(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
