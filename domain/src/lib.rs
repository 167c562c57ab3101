//! Domain layer for care-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns, and
//! no async runtime: every operation is a pure function of its inputs
//! (time is always passed in).
//!
//! # Core Concepts
//!
//! ## Agents
//!
//! Five cooperating agent kinds (intake, crisis-safety, cultural-adaptation,
//! progress-tracking, coordination). Each owns a [`CircuitBreaker`] and
//! [`PerformanceMetrics`]; the envelope that runs them lives in the
//! application layer.
//!
//! ## Coordination
//!
//! A [`SessionPlan`] picks a [`CoordinationStrategy`] for each round; agent
//! outputs are merged by [`synthesize`] and scored by [`QualityAssessor`].
//!
//! ## Collaboration
//!
//! Handoffs run a [`HandoffProtocol`] with [`QualityGate`]s inside a
//! [`CollaborationSession`]; [`JointIntervention`]s run a dependency graph of
//! steps; supervision is matched from [`SupervisionProtocol`]s.
//!
//! ## Safety net
//!
//! [`CrisisFallbackScorer`] classifies risk without the generation
//! capability, and [`parse_analysis`] never trusts generated JSON blindly.

pub mod agent;
pub mod analysis;
pub mod collaboration;
pub mod config;
pub mod coordination;
pub mod core;
pub mod crisis;
pub mod prompt;
pub mod resilience;

// Re-export commonly used types
pub use agent::{
    AgentId, AgentMessage, AgentOutput, AgentResponse, AgentStatus, AgentType, EWMA_ALPHA,
    ExecutionResult, MessageContext, PerformanceMetrics,
};
pub use analysis::{AgentAnalysis, parse_analysis};
pub use collaboration::{
    CollaborationContext, CollaborationSession, ExecutionMode, GateFailureAction,
    HandoffProtocol, HandoffStep, InterventionStatus, InterventionStep, InterventionStepResult,
    InterventionType, JointIntervention, ProtocolKind, ProtocolLibrary, QualityGate,
    SessionStatus, StepAction, StepExecutor, SupervisionLevel, SupervisionProtocol,
    SupervisionRecord, UrgencyLevel, WorkflowType,
};
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use coordination::{
    AgentCoordinationPlan, CoordinatedResponse, CoordinationStrategy, QualityAssessment,
    QualityAssessor, RiskLevel, SessionPlan, SessionPlanner, SynthesizedResponse, synthesize,
};
pub use core::error::DomainError;
pub use crisis::{CrisisAssessment, CrisisFallbackScorer, RiskTier};
pub use prompt::AgentPromptTemplate;
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState};
