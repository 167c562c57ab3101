//! The user-facing result of one coordination round.

use super::quality::QualityAssessment;
use super::strategy::CoordinationStrategy;
use super::synthesis::SynthesizedResponse;
use crate::agent::ExecutionResult;
use crate::crisis::RiskTier;
use serde::{Deserialize, Serialize};

/// Reply used when no agent produced a usable output.
pub const FALLBACK_MESSAGE: &str = "Thank you for sharing this with me. I'm having trouble \
putting together a full response right now, but I want you to know you're being heard. \
If anything feels unsafe, please reach out to someone you trust or a local support line.";

/// Reply used when no agent answered and the message looked high-risk.
pub const CRISIS_FALLBACK_MESSAGE: &str = "I'm really concerned about what you've shared and \
your safety matters. Please contact a crisis line or emergency services now, or reach out to \
someone near you. If you are in the US you can call or text 988. A member of the care team is \
being notified.";

/// Coordinated response for one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatedResponse {
    pub session_id: String,
    pub response: String,
    pub insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_integration: Option<String>,
    pub next_steps: Vec<String>,
    pub escalation_needed: bool,
    pub risk_tier: RiskTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<CoordinationStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityAssessment>,
    pub agent_results: Vec<ExecutionResult>,
    pub round: u32,
    /// True when the conservative fallback was returned
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub processing_time_ms: u64,
}

impl CoordinatedResponse {
    /// Assemble a response from a successful round.
    pub fn from_synthesis(
        session_id: impl Into<String>,
        synthesis: SynthesizedResponse,
        quality: QualityAssessment,
        strategy: CoordinationStrategy,
        agent_results: Vec<ExecutionResult>,
        round: u32,
    ) -> Self {
        let escalation_needed = synthesis.escalation_needed || quality.escalation_needed;
        Self {
            session_id: session_id.into(),
            response: synthesis.primary_response,
            insights: synthesis.coordinated_insights,
            cultural_integration: synthesis.cultural_integration,
            next_steps: synthesis.next_steps,
            escalation_needed,
            risk_tier: synthesis.risk_tier,
            strategy: Some(strategy),
            quality: Some(quality),
            agent_results,
            round,
            is_fallback: false,
            fallback_reason: None,
            processing_time_ms: 0,
        }
    }

    /// Conservative safety-oriented reply used when coordination failed.
    ///
    /// Escalates when the pre-screen tier is high or crisis.
    pub fn fallback(
        session_id: impl Into<String>,
        pre_screen: RiskTier,
        reason: impl Into<String>,
    ) -> Self {
        let escalation_needed = pre_screen.requires_escalation();
        let (response, next_steps) = if escalation_needed {
            (
                CRISIS_FALLBACK_MESSAGE,
                vec![
                    super::synthesis::ESCALATION_NEXT_STEP.to_string(),
                    "Stay with the user until a clinician responds".to_string(),
                ],
            )
        } else {
            (
                FALLBACK_MESSAGE,
                vec!["Retry the conversation once agents recover".to_string()],
            )
        };
        Self {
            session_id: session_id.into(),
            response: response.to_string(),
            insights: Vec::new(),
            cultural_integration: None,
            next_steps,
            escalation_needed,
            risk_tier: pre_screen,
            strategy: None,
            quality: None,
            agent_results: Vec::new(),
            round: 0,
            is_fallback: true,
            fallback_reason: Some(reason.into()),
            processing_time_ms: 0,
        }
    }

    pub fn with_strategy(mut self, strategy: CoordinationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_agent_results(mut self, results: Vec<ExecutionResult>) -> Self {
        self.agent_results = results;
        self
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = round;
        self
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }

    pub fn successful_agents(&self) -> usize {
        self.agent_results.iter().filter(|r| r.success).count()
    }
}
