//! Collaboration domain module
//!
//! Handoff protocols with quality gates, collaboration sessions, joint
//! interventions over a dependency graph, and supervision protocols.

pub mod context;
pub mod graph;
pub mod intervention;
pub mod protocol;
pub mod session;
pub mod supervision;

pub use context::{CollaborationContext, DEFAULT_MAX_DURATION_MS, UrgencyLevel, WorkflowType};
pub use graph::{DependencyNode, dependency_phases, topological_order};
pub use intervention::{
    ExecutionMode, InterventionStatus, InterventionStep, InterventionStepResult, InterventionType,
    JointIntervention,
};
pub use protocol::{
    GateCheck, GateCriterion, GateEvaluation, GateFailureAction, HandoffProtocol, HandoffStep,
    ProtocolKind, ProtocolLibrary, QualityGate, RESTORE_OWNERSHIP_HOOK, StepAction, StepExecutor,
    keys,
};
pub use session::{CollaborationSession, ErrorEntry, InteractionEntry, SessionStatus};
pub use supervision::{
    AppliedProcedure, InterventionProcedure, ON_CALL_SUPERVISOR, SupervisionLevel,
    SupervisionProtocol, SupervisionRecord, match_protocol,
};
