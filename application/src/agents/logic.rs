//! Agent kinds.
//!
//! The set of kinds is closed, so dispatch is a plain `match` on
//! [`AgentLogic`]. Every kind builds its prompts from
//! [`AgentPromptTemplate`], runs the analysis step and validates the result
//! with [`parse_analysis`]. Only the crisis-safety kind has a fallback path.

use super::analysis::run_analysis;
use crate::config::RetryPolicy;
use crate::ports::llm_gateway::LlmGateway;
use crate::runtime::error::AgentError;
use council_domain::prompt::ROLE_MARKER;
use council_domain::{
    AgentAnalysis, AgentMessage, AgentOutput, AgentPromptTemplate, AgentType,
    CrisisAssessment, CrisisFallbackScorer, MessageContext, RiskTier, parse_analysis,
};
use council_domain::coordination::{CRISIS_FALLBACK_MESSAGE, FALLBACK_MESSAGE};
use std::time::Duration;
use tracing::{debug, warn};

/// Phrase the crisis self-test expects the scorer to rank as crisis.
const SELF_TEST_CRISIS_PHRASE: &str = "I want to kill myself tonight";

/// Confidence of an output produced by the keyword screen alone.
const SCREEN_CONFIDENCE: f64 = 0.3;

/// Time kept back from the call deadline for the crisis keyword screen.
const SCREEN_RESERVE: Duration = Duration::from_millis(250);

/// Behavior of one agent kind.
#[derive(Debug, Clone)]
pub enum AgentLogic {
    Intake,
    CrisisSafety(CrisisFallbackScorer),
    CulturalAdaptation,
    ProgressTracking,
    Coordination,
}

impl AgentLogic {
    /// Logic for `agent_type`. The scorer is only kept by crisis-safety.
    pub fn for_type(agent_type: AgentType, scorer: CrisisFallbackScorer) -> Self {
        match agent_type {
            AgentType::Intake => AgentLogic::Intake,
            AgentType::CrisisSafety => AgentLogic::CrisisSafety(scorer),
            AgentType::CulturalAdaptation => AgentLogic::CulturalAdaptation,
            AgentType::ProgressTracking => AgentLogic::ProgressTracking,
            AgentType::Coordination => AgentLogic::Coordination,
        }
    }

    pub fn agent_type(&self) -> AgentType {
        match self {
            AgentLogic::Intake => AgentType::Intake,
            AgentLogic::CrisisSafety(_) => AgentType::CrisisSafety,
            AgentLogic::CulturalAdaptation => AgentType::CulturalAdaptation,
            AgentLogic::ProgressTracking => AgentType::ProgressTracking,
            AgentLogic::Coordination => AgentType::Coordination,
        }
    }

    /// Produce this agent's output for one message.
    ///
    /// `deadline` is how long the caller will wait. The crisis kind stops
    /// its analysis short of it so the keyword screen still answers.
    pub async fn run(
        &self,
        gateway: &dyn LlmGateway,
        retry: &RetryPolicy,
        deadline: Duration,
        message: &AgentMessage,
        context: &MessageContext,
    ) -> Result<AgentOutput, AgentError> {
        let agent_type = self.agent_type();
        let system = AgentPromptTemplate::system(agent_type);
        let prompt = AgentPromptTemplate::analysis(agent_type, message, context);

        let analysis = match self {
            AgentLogic::CrisisSafety(_) => {
                let bound = deadline.saturating_sub(SCREEN_RESERVE);
                tokio::time::timeout(
                    bound,
                    run_analysis(gateway, agent_type, &prompt, &system, retry),
                )
                .await
                .unwrap_or_else(|_| Err(AgentError::Timeout(bound)))
            }
            _ => run_analysis(gateway, agent_type, &prompt, &system, retry).await,
        };

        match self {
            AgentLogic::CrisisSafety(scorer) => {
                let screen = scorer.score(&message.content);
                match analysis {
                    Ok(text) => Ok(crisis_output(parse_analysis(&text), &screen)),
                    Err(e) => {
                        warn!(
                            error = %e,
                            tier = %screen.tier,
                            "Crisis analysis failed, using keyword screen"
                        );
                        Ok(screen_output(&screen))
                    }
                }
            }
            _ => {
                let parsed = parse_analysis(&analysis?);
                if let Some(reason) = &parsed.parse_failure {
                    debug!(agent = %agent_type, reason = %reason, "Analysis output was not JSON");
                }
                Ok(output_from_analysis(agent_type, parsed))
            }
        }
    }

    /// Check that this kind can do its job without calling out.
    pub fn self_test(&self) -> Result<(), String> {
        let agent_type = self.agent_type();
        let system = AgentPromptTemplate::system(agent_type);
        if system.trim().is_empty() || !system.contains(ROLE_MARKER) {
            return Err(format!("{} system prompt did not render", agent_type));
        }
        let sample = AgentMessage::new("self-test", "self-test", "hello");
        if AgentPromptTemplate::analysis(agent_type, &sample, &MessageContext::new())
            .trim()
            .is_empty()
        {
            return Err(format!("{} analysis prompt did not render", agent_type));
        }

        if let AgentLogic::CrisisSafety(scorer) = self {
            let tier = scorer.score(SELF_TEST_CRISIS_PHRASE).tier;
            if tier != RiskTier::Crisis {
                return Err(format!("crisis screen ranked a known crisis phrase as {}", tier));
            }
        }
        Ok(())
    }
}

fn output_from_analysis(agent_type: AgentType, analysis: AgentAnalysis) -> AgentOutput {
    let mut output = AgentOutput::new(agent_type, analysis.response)
        .with_confidence(analysis.confidence)
        .with_reasoning(analysis.reasoning)
        .with_escalation(analysis.escalation_needed)
        .with_risk_tier(analysis.risk_tier)
        .with_low_confidence(analysis.low_confidence);
    output.key_insights = analysis.key_insights;
    output.recommendations = analysis.recommendations;
    output
}

/// Parsed crisis analysis, cross-checked with the keyword screen when the
/// parse had to fill in defaults.
fn crisis_output(analysis: AgentAnalysis, screen: &CrisisAssessment) -> AgentOutput {
    let low_confidence = analysis.low_confidence;
    let mut output = output_from_analysis(AgentType::CrisisSafety, analysis);
    if low_confidence && screen.tier > output.risk_tier {
        output.risk_tier = screen.tier;
        output
            .key_insights
            .push(format!("keyword screen raised risk to {}", screen.tier));
    }
    if output.risk_tier.requires_escalation() {
        output.escalation_needed = true;
    }
    if output.content.trim().is_empty() && output.escalation_needed {
        output.content = CRISIS_FALLBACK_MESSAGE.to_string();
    }
    output
}

/// Output built from the keyword screen alone.
fn screen_output(screen: &CrisisAssessment) -> AgentOutput {
    let content = if screen.escalation_needed {
        CRISIS_FALLBACK_MESSAGE
    } else {
        FALLBACK_MESSAGE
    };
    let mut output = AgentOutput::new(AgentType::CrisisSafety, content)
        .with_confidence(SCREEN_CONFIDENCE)
        .with_reasoning(format!(
            "keyword screen only; matched: {}",
            if screen.matched.is_empty() {
                "nothing".to_string()
            } else {
                screen.matched.join(", ")
            }
        ))
        .with_risk_tier(screen.tier)
        .with_escalation(screen.escalation_needed)
        .with_low_confidence(true);
    if screen.escalation_needed {
        output = output.with_recommendation("Bring in a human clinician now");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm_gateway::GatewayError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct ReplyGateway(Result<String, GatewayError>);

    #[async_trait]
    impl LlmGateway for ReplyGateway {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, GatewayError> {
            self.0.clone()
        }

        async fn health_check(&self) -> bool {
            self.0.is_ok()
        }
    }

    const DEADLINE: Duration = Duration::from_secs(5);

    /// Never answers.
    struct HangingGateway;

    #[async_trait]
    impl LlmGateway for HangingGateway {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, GatewayError> {
            std::future::pending().await
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::none().with_attempt_timeout(Duration::from_millis(200))
    }

    fn crisis() -> AgentLogic {
        AgentLogic::for_type(AgentType::CrisisSafety, CrisisFallbackScorer::default())
    }

    #[tokio::test]
    async fn test_structured_output_is_used() {
        let gateway = ReplyGateway(Ok(r#"```json
{"response": "Tell me about your week", "confidence": 0.8, "reasoning": "first contact",
 "key_insights": ["new user"], "recommendations": ["gather history"],
 "escalation_needed": false, "risk_level": "low"}
```"#
            .to_string()));
        let message = AgentMessage::new("s", "u", "Hi, I'm new here");
        let output = AgentLogic::Intake
            .run(&gateway, &policy(), DEADLINE, &message, &MessageContext::new())
            .await
            .unwrap();
        assert_eq!(output.agent_type, AgentType::Intake);
        assert_eq!(output.content, "Tell me about your week");
        assert_eq!(output.confidence, 0.8);
        assert_eq!(output.key_insights, vec!["new user"]);
        assert!(!output.low_confidence);
    }

    #[tokio::test]
    async fn test_non_crisis_failure_propagates() {
        let gateway = ReplyGateway(Err(GatewayError::Unavailable("down".to_string())));
        let message = AgentMessage::new("s", "u", "hello");
        let err = AgentLogic::ProgressTracking
            .run(&gateway, &policy(), DEADLINE, &message, &MessageContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Gateway(GatewayError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_crisis_falls_back_to_screen() {
        let gateway = ReplyGateway(Err(GatewayError::Timeout));
        let message = AgentMessage::new("s", "u", "I want to kill myself tonight");
        let output = crisis()
            .run(&gateway, &policy(), DEADLINE, &message, &MessageContext::new())
            .await
            .unwrap();
        assert_eq!(output.risk_tier, RiskTier::Crisis);
        assert!(output.escalation_needed);
        assert!(output.low_confidence);
        assert_eq!(output.content, CRISIS_FALLBACK_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crisis_screen_answers_before_deadline() {
        // Retries alone would outlast the deadline.
        let slow = RetryPolicy::default().with_attempt_timeout(Duration::from_secs(60));
        let message = AgentMessage::new("s", "u", "I want to kill myself tonight");
        let started = tokio::time::Instant::now();

        let output = tokio::time::timeout(
            DEADLINE,
            crisis().run(&HangingGateway, &slow, DEADLINE, &message, &MessageContext::new()),
        )
        .await
        .expect("screen answers inside the deadline")
        .unwrap();

        assert!(started.elapsed() < DEADLINE);
        assert_eq!(output.risk_tier, RiskTier::Crisis);
        assert!(output.escalation_needed);
    }

    #[tokio::test]
    async fn test_crisis_low_confidence_takes_higher_tier() {
        // Plain text: every field defaults, so the screen decides the tier.
        let gateway = ReplyGateway(Ok("I hear how hard this is.".to_string()));
        let message = AgentMessage::new("s", "u", "I want to kill myself tonight");
        let output = crisis()
            .run(&gateway, &policy(), DEADLINE, &message, &MessageContext::new())
            .await
            .unwrap();
        assert_eq!(output.risk_tier, RiskTier::Crisis);
        assert!(output.escalation_needed);
        assert_eq!(output.content, "I hear how hard this is.");
    }

    #[tokio::test]
    async fn test_crisis_confident_parse_is_trusted() {
        let gateway = ReplyGateway(Ok(r#"{"response": "ok", "confidence": 0.9, "reasoning": "r",
            "key_insights": [], "recommendations": [], "escalation_needed": false,
            "risk_level": "low"}"#
            .to_string()));
        let message = AgentMessage::new("s", "u", "I had a stressful day");
        let output = crisis()
            .run(&gateway, &policy(), DEADLINE, &message, &MessageContext::new())
            .await
            .unwrap();
        assert_eq!(output.risk_tier, RiskTier::Low);
        assert!(!output.escalation_needed);
    }

    #[tokio::test]
    async fn test_high_tier_forces_escalation() {
        let gateway = ReplyGateway(Ok(r#"{"response": "Are you safe right now?", "confidence": 0.9,
            "reasoning": "r", "key_insights": [], "recommendations": [],
            "escalation_needed": false, "risk_level": "high"}"#
            .to_string()));
        let message = AgentMessage::new("s", "u", "I don't see the point anymore");
        let output = crisis()
            .run(&gateway, &policy(), DEADLINE, &message, &MessageContext::new())
            .await
            .unwrap();
        assert!(output.escalation_needed);
    }

    #[test]
    fn test_self_test_passes_for_every_kind() {
        for agent_type in AgentType::ALL {
            let logic = AgentLogic::for_type(agent_type, CrisisFallbackScorer::default());
            assert_eq!(logic.agent_type(), agent_type);
            assert!(logic.self_test().is_ok(), "{} self-test failed", agent_type);
        }
    }

    #[test]
    fn test_crisis_self_test_detects_broken_scorer() {
        let logic = AgentLogic::CrisisSafety(CrisisFallbackScorer::new(Vec::new()));
        assert!(logic.self_test().is_err());
    }
}
