//! Collaboration context: why and how agents are brought together.

use crate::agent::AgentType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;

/// Default ceiling on a collaboration session's wall-clock time.
pub const DEFAULT_MAX_DURATION_MS: u64 = 30 * 60 * 1000;

/// Kind of collaboration workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Handoff,
    Consultation,
    JointIntervention,
    Supervision,
    CrisisEscalation,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Handoff => "handoff",
            WorkflowType::Consultation => "consultation",
            WorkflowType::JointIntervention => "joint_intervention",
            WorkflowType::Supervision => "supervision",
            WorkflowType::CrisisEscalation => "crisis_escalation",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Urgency of a collaboration need.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
            UrgencyLevel::Critical => "critical",
        }
    }
}

impl FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(UrgencyLevel::Low),
            "medium" | "normal" => Ok(UrgencyLevel::Medium),
            "high" => Ok(UrgencyLevel::High),
            "critical" | "urgent" => Ok(UrgencyLevel::Critical),
            other => Err(format!("unknown urgency level: {}", other)),
        }
    }
}

/// Why and how a set of agents collaborates.
///
/// Built once per coordination need; a session takes its own copy and
/// never changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationContext {
    pub session_id: String,
    pub user_id: String,
    pub primary_agent: AgentType,
    #[serde(default)]
    pub collaborating_agents: Vec<AgentType>,
    pub workflow_type: WorkflowType,
    pub trigger_reason: String,
    pub urgency: UrgencyLevel,
    pub requires_human_oversight: bool,
    pub max_duration_ms: u64,
    #[serde(default)]
    pub shared: Map<String, Value>,
}

impl CollaborationContext {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        primary_agent: AgentType,
        workflow_type: WorkflowType,
        trigger_reason: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            primary_agent,
            collaborating_agents: Vec::new(),
            workflow_type,
            trigger_reason: trigger_reason.into(),
            urgency: UrgencyLevel::default(),
            requires_human_oversight: false,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            shared: Map::new(),
        }
    }

    pub fn with_collaborators(mut self, agents: Vec<AgentType>) -> Self {
        self.collaborating_agents = agents;
        self
    }

    pub fn with_urgency(mut self, urgency: UrgencyLevel) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_human_oversight(mut self, required: bool) -> Self {
        self.requires_human_oversight = required;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration_ms = max_duration.as_millis() as u64;
        self
    }

    pub fn with_shared(mut self, key: impl Into<String>, value: Value) -> Self {
        self.shared.insert(key.into(), value);
        self
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    /// Primary agent followed by collaborators, without duplicates.
    pub fn all_agents(&self) -> Vec<AgentType> {
        let mut agents = vec![self.primary_agent];
        for agent in &self.collaborating_agents {
            if !agents.contains(agent) {
                agents.push(*agent);
            }
        }
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_agents_dedups_primary() {
        let context = CollaborationContext::new(
            "s",
            "u",
            AgentType::Intake,
            WorkflowType::Handoff,
            "routine",
        )
        .with_collaborators(vec![AgentType::Intake, AgentType::ProgressTracking]);
        assert_eq!(
            context.all_agents(),
            vec![AgentType::Intake, AgentType::ProgressTracking]
        );
    }

    #[test]
    fn test_urgency_ordering_and_parse() {
        assert!(UrgencyLevel::Critical > UrgencyLevel::High);
        assert_eq!("URGENT".parse::<UrgencyLevel>(), Ok(UrgencyLevel::Critical));
        assert!("whenever".parse::<UrgencyLevel>().is_err());
    }

    #[test]
    fn test_serializes_snake_case() {
        let context = CollaborationContext::new(
            "s",
            "u",
            AgentType::CrisisSafety,
            WorkflowType::CrisisEscalation,
            "self-harm disclosed",
        )
        .with_urgency(UrgencyLevel::Critical);
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["workflow_type"], "crisis_escalation");
        assert_eq!(json["primary_agent"], "crisis_safety");
        assert_eq!(json["urgency"], "critical");
    }
}
