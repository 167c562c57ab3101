//! Coordination domain module
//!
//! Pure pieces of a coordination round: planning and strategy selection,
//! synthesis of agent outputs, quality assessment, and the response type.
//! Dispatching to agents lives in the application layer.

pub mod plan;
pub mod quality;
pub mod response;
pub mod strategy;
pub mod synthesis;

pub use plan::{
    AgentCoordinationPlan, CoordinationStep, DEFAULT_SAFETY_THRESHOLD, FallbackPlan,
    QualityCheck, RiskLevel, RiskManagement, SessionPlan, SessionPlanner, TherapeuticApproach,
    select_strategy,
};
pub use quality::{QualityAssessment, QualityAssessor, QualityWeights};
pub use response::{CRISIS_FALLBACK_MESSAGE, CoordinatedResponse, FALLBACK_MESSAGE};
pub use strategy::CoordinationStrategy;
pub use synthesis::{ESCALATION_NEXT_STEP, SynthesizedResponse, synthesize};
