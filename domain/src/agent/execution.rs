//! Inputs and outputs of a single agent execution.
//!
//! - [`AgentMessage`] - one inbound user message addressed to the council
//! - [`MessageContext`] - per-dispatch context (cultural data, prior outputs)
//! - [`AgentOutput`] - what an agent's logic produced
//! - [`ExecutionResult`] - the operator-facing record of one execution

use super::value_objects::{AgentId, AgentType};
use crate::crisis::RiskTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            received_at: Utc::now(),
        }
    }
}

/// Context handed to an agent together with the message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContext {
    /// Free-form description of the user's cultural background, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_context: Option<String>,
    /// Task assigned by the coordinator for this dispatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Outputs of earlier steps in a sequential run
    #[serde(default)]
    pub previous_responses: Vec<AgentOutput>,
    /// Round-one outputs of all peers (consensus round two)
    #[serde(default)]
    pub peer_outputs: Vec<AgentOutput>,
    /// Arbitrary shared data (handoff transfers, intervention results)
    #[serde(default)]
    pub shared: Map<String, Value>,
    /// Coordination round within the session (1-based)
    pub turn: u32,
}

impl MessageContext {
    pub fn new() -> Self {
        Self {
            turn: 1,
            ..Default::default()
        }
    }

    pub fn with_cultural_context(mut self, context: impl Into<String>) -> Self {
        self.cultural_context = Some(context.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_previous_responses(mut self, responses: Vec<AgentOutput>) -> Self {
        self.previous_responses = responses;
        self
    }

    pub fn with_peer_outputs(mut self, outputs: Vec<AgentOutput>) -> Self {
        self.peer_outputs = outputs;
        self
    }

    pub fn with_shared(mut self, key: impl Into<String>, value: Value) -> Self {
        self.shared.insert(key.into(), value);
        self
    }

    pub fn with_turn(mut self, turn: u32) -> Self {
        self.turn = turn;
        self
    }
}

/// Output of one agent's logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent_type: AgentType,
    /// Text the agent proposes for the user-facing reply
    pub content: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    /// Recommendations addressed to the coordinator
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub escalation_needed: bool,
    pub risk_tier: RiskTier,
    /// Set when any field fell back to a default during parsing
    pub low_confidence: bool,
    /// Weight of this output in the synthesized reply
    pub influence: f64,
}

impl AgentOutput {
    pub fn new(agent_type: AgentType, content: impl Into<String>) -> Self {
        Self {
            agent_type,
            content: content.into(),
            confidence: 0.5,
            reasoning: String::new(),
            key_insights: Vec::new(),
            recommendations: Vec::new(),
            escalation_needed: false,
            risk_tier: RiskTier::None,
            low_confidence: false,
            influence: agent_type.default_influence(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_insight(mut self, insight: impl Into<String>) -> Self {
        self.key_insights.push(insight.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_escalation(mut self, escalation_needed: bool) -> Self {
        self.escalation_needed = escalation_needed;
        self
    }

    pub fn with_risk_tier(mut self, tier: RiskTier) -> Self {
        self.risk_tier = tier;
        self
    }

    pub fn with_low_confidence(mut self, low_confidence: bool) -> Self {
        self.low_confidence = low_confidence;
        self
    }

    /// Influence scaled by confidence; used to rank outputs.
    pub fn weight(&self) -> f64 {
        self.influence * self.confidence
    }
}

/// Response returned by an agent's execution envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: AgentId,
    pub session_id: String,
    pub output: AgentOutput,
    pub processing_time_ms: u64,
}

/// Operator-facing record of one execution, including failures.
///
/// Offsets are milliseconds relative to the start of the overall request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub agent_id: AgentId,
    pub agent_type: AgentType,
    pub assigned_task: String,
    pub start_offset_ms: u64,
    pub end_offset_ms: u64,
    pub success: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub influence: f64,
    pub escalation_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Build a successful record from an agent output.
    pub fn from_output(
        agent_id: AgentId,
        assigned_task: impl Into<String>,
        output: &AgentOutput,
        start_offset_ms: u64,
        end_offset_ms: u64,
    ) -> Self {
        Self {
            agent_id,
            agent_type: output.agent_type,
            assigned_task: assigned_task.into(),
            start_offset_ms,
            end_offset_ms,
            success: true,
            confidence: output.confidence,
            reasoning: output.reasoning.clone(),
            key_insights: output.key_insights.clone(),
            recommendations: output.recommendations.clone(),
            influence: output.influence,
            escalation_needed: output.escalation_needed,
            error: None,
        }
    }

    /// Build a failed record. Confidence and influence are zero.
    pub fn failure(
        agent_id: AgentId,
        agent_type: AgentType,
        assigned_task: impl Into<String>,
        error: impl Into<String>,
        start_offset_ms: u64,
        end_offset_ms: u64,
    ) -> Self {
        Self {
            agent_id,
            agent_type,
            assigned_task: assigned_task.into(),
            start_offset_ms,
            end_offset_ms,
            success: false,
            confidence: 0.0,
            reasoning: String::new(),
            key_insights: Vec::new(),
            recommendations: Vec::new(),
            influence: 0.0,
            escalation_needed: false,
            error: Some(error.into()),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_offset_ms.saturating_sub(self.start_offset_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_confidence_clamped() {
        let output = AgentOutput::new(AgentType::Intake, "hi").with_confidence(1.7);
        assert_eq!(output.confidence, 1.0);
        let output = AgentOutput::new(AgentType::Intake, "hi").with_confidence(-0.2);
        assert_eq!(output.confidence, 0.0);
    }

    #[test]
    fn test_weight_uses_default_influence() {
        let output = AgentOutput::new(AgentType::CrisisSafety, "stay safe").with_confidence(0.8);
        assert!((output.weight() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_failure_record() {
        let result = ExecutionResult::failure(
            AgentId::new("intake-1"),
            AgentType::Intake,
            "gather history",
            "timeout",
            10,
            35,
        );
        assert!(!result.success);
        assert_eq!(result.duration_ms(), 25);
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert_eq!(result.influence, 0.0);
    }

    #[test]
    fn test_context_builder_starts_at_turn_one() {
        let context = MessageContext::new()
            .with_cultural_context("Filipino-American, bilingual")
            .with_shared("handoff", serde_json::json!({"from": "intake"}));
        assert_eq!(context.turn, 1);
        assert!(context.shared.contains_key("handoff"));
    }
}
