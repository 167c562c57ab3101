//! Fixture gateway with canned, role-specific replies.
//!
//! Used by `--offline` and in tests. Replies follow the analysis JSON
//! schema, and the crisis agent escalates when the user message scores
//! high or crisis on the keyword scorer.

use async_trait::async_trait;
use council_application::{GatewayError, LlmGateway};
use council_domain::prompt::ROLE_MARKER;
use council_domain::{AgentType, CrisisFallbackScorer, RiskTier};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

const USER_MESSAGE_HEADER: &str = "User message:\n";

#[derive(Default)]
pub struct CannedLlmGateway {
    scorer: CrisisFallbackScorer,
    calls: AtomicUsize,
}

impl CannedLlmGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn role(system_context: &str) -> Option<AgentType> {
        let start = system_context.find(ROLE_MARKER)? + ROLE_MARKER.len();
        let line = system_context[start..].lines().next()?;
        line.parse().ok()
    }

    fn user_message(prompt: &str) -> &str {
        match prompt.find(USER_MESSAGE_HEADER) {
            Some(start) => {
                let rest = &prompt[start + USER_MESSAGE_HEADER.len()..];
                rest.split("\n\n").next().unwrap_or(rest)
            }
            None => "",
        }
    }

    fn reply(&self, role: Option<AgentType>, tier: RiskTier) -> serde_json::Value {
        let urgent = tier.requires_escalation();
        match role {
            Some(AgentType::CrisisSafety) if urgent => json!({
                "response": "I'm really glad you told me. Your safety matters most right now. \
If you are in immediate danger, please call your local emergency number or a crisis line.",
                "confidence": 0.9,
                "reasoning": "The message contains language associated with risk of harm.",
                "key_insights": ["possible risk of harm"],
                "recommendations": ["connect the user with a human crisis counselor now"],
                "escalation_needed": true,
                "risk_level": tier.as_str(),
            }),
            Some(AgentType::CrisisSafety) => json!({
                "response": "Thank you for sharing this. I don't hear an immediate safety concern, \
but please reach out right away if that changes.",
                "confidence": 0.8,
                "reasoning": "No high-risk language found.",
                "key_insights": [],
                "recommendations": ["continue routine safety check-ins"],
                "escalation_needed": false,
                "risk_level": tier.as_str(),
            }),
            Some(AgentType::Intake) => json!({
                "response": "It sounds like a lot is weighing on you. Could you tell me a bit more \
about what has been happening?",
                "confidence": 0.8,
                "reasoning": "Gathering the presenting concern.",
                "key_insights": ["user is seeking support"],
                "recommendations": ["explore history and current stressors"],
                "escalation_needed": false,
                "risk_level": tier.as_str(),
            }),
            Some(AgentType::CulturalAdaptation) => json!({
                "response": "I'd like to understand what support looks like for you and the people \
around you, so the suggestions fit your life.",
                "confidence": 0.75,
                "reasoning": "Checking cultural fit of the care approach.",
                "key_insights": ["cultural background may shape preferred support"],
                "recommendations": ["ask about family and community values"],
                "escalation_needed": false,
                "risk_level": tier.as_str(),
            }),
            Some(AgentType::ProgressTracking) => json!({
                "response": "Let's keep track of how this changes over the next few days.",
                "confidence": 0.7,
                "reasoning": "Relating the message to ongoing goals.",
                "key_insights": ["baseline for later comparison"],
                "recommendations": ["set one small goal for this week"],
                "escalation_needed": false,
                "risk_level": tier.as_str(),
            }),
            Some(AgentType::Coordination) => json!({
                "response": "Here is a plan we can start with together.",
                "confidence": 0.75,
                "reasoning": "Combining the team's views into next steps.",
                "key_insights": ["team views are consistent"],
                "recommendations": ["schedule a follow-up check-in"],
                "escalation_needed": false,
                "risk_level": tier.as_str(),
            }),
            None => json!({
                "response": "I'm here and listening.",
                "confidence": 0.5,
                "reasoning": "",
                "key_insights": [],
                "recommendations": [],
                "escalation_needed": false,
                "risk_level": "none",
            }),
        }
    }
}

#[async_trait]
impl LlmGateway for CannedLlmGateway {
    async fn generate(&self, prompt: &str, system_context: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tier = self.scorer.score(Self::user_message(prompt)).tier;
        let reply = self.reply(Self::role(system_context), tier);
        Ok(format!("```json\n{}\n```", reply))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{AgentPromptTemplate, parse_analysis};

    fn prompt(message: &str) -> String {
        format!("{}{}\n\nYour task this turn: respond\n", USER_MESSAGE_HEADER, message)
    }

    #[tokio::test]
    async fn test_reply_parses_without_defaults() {
        let gateway = CannedLlmGateway::new();
        let system = AgentPromptTemplate::system(AgentType::Intake);
        let text = gateway.generate(&prompt("I feel stuck"), &system).await.unwrap();

        let analysis = parse_analysis(&text);
        assert!(!analysis.low_confidence);
        assert!(!analysis.escalation_needed);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_crisis_agent_escalates_on_crisis_language() {
        let gateway = CannedLlmGateway::new();
        let system = AgentPromptTemplate::system(AgentType::CrisisSafety);
        let text = gateway
            .generate(&prompt("I want to kill myself"), &system)
            .await
            .unwrap();

        let analysis = parse_analysis(&text);
        assert!(analysis.escalation_needed);
        assert!(analysis.risk_tier >= RiskTier::High);
    }

    #[test]
    fn test_role_is_read_from_system_context() {
        for agent_type in AgentType::ALL {
            let system = AgentPromptTemplate::system(agent_type);
            assert_eq!(CannedLlmGateway::role(&system), Some(agent_type));
        }
        assert_eq!(CannedLlmGateway::role("no marker"), None);
    }

    #[test]
    fn test_user_message_stops_at_blank_line() {
        assert_eq!(CannedLlmGateway::user_message(&prompt("hello")), "hello");
        assert_eq!(CannedLlmGateway::user_message("handoff only"), "");
    }
}
