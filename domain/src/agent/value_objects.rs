//! Agent value objects - identity, role and lifecycle status.
//!
//! # Identifiers
//! - [`AgentId`] - Unique identifier for an agent instance
//!
//! # Roles
//! - [`AgentType`] - The fixed set of specialized roles a council can field
//! - [`AgentStatus`] - Lifecycle status reported by an agent's envelope

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unique identifier for an agent instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an AgentId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates an id of the form `<agent-type>-<short uuid>`.
    pub fn generate(agent_type: AgentType) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", agent_type.as_str(), &uuid[..8]))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for AgentId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Specialized role of an agent.
///
/// The set is closed: every council fields at most one agent per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// First contact: gathers the presenting concern and history
    Intake,
    /// Risk screening and safety planning; highest priority
    CrisisSafety,
    /// Adapts language and interventions to the user's cultural context
    CulturalAdaptation,
    /// Tracks goals and progress across sessions
    ProgressTracking,
    /// Integrates other agents' work into a care plan
    Coordination,
}

impl AgentType {
    /// All agent types, in declaration order.
    pub const ALL: [AgentType; 5] = [
        AgentType::Intake,
        AgentType::CrisisSafety,
        AgentType::CulturalAdaptation,
        AgentType::ProgressTracking,
        AgentType::Coordination,
    ];

    /// Precedence used when the priority agent did not escalate.
    ///
    /// Crisis-safety is excluded because it always runs first.
    pub const PRECEDENCE: [AgentType; 4] = [
        AgentType::Intake,
        AgentType::CulturalAdaptation,
        AgentType::ProgressTracking,
        AgentType::Coordination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Intake => "intake",
            AgentType::CrisisSafety => "crisis_safety",
            AgentType::CulturalAdaptation => "cultural_adaptation",
            AgentType::ProgressTracking => "progress_tracking",
            AgentType::Coordination => "coordination",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::Intake => "Intake",
            AgentType::CrisisSafety => "Crisis Safety",
            AgentType::CulturalAdaptation => "Cultural Adaptation",
            AgentType::ProgressTracking => "Progress Tracking",
            AgentType::Coordination => "Coordination",
        }
    }

    /// Default weight of this agent's output in the final response.
    pub fn default_influence(&self) -> f64 {
        match self {
            AgentType::CrisisSafety => 1.0,
            AgentType::Intake => 0.8,
            AgentType::CulturalAdaptation => 0.7,
            AgentType::Coordination => 0.6,
            AgentType::ProgressTracking => 0.5,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "intake" => Ok(AgentType::Intake),
            "crisis_safety" | "crisis" | "safety" => Ok(AgentType::CrisisSafety),
            "cultural_adaptation" | "cultural" => Ok(AgentType::CulturalAdaptation),
            "progress_tracking" | "progress" => Ok(AgentType::ProgressTracking),
            "coordination" | "coordinator" => Ok(AgentType::Coordination),
            other => Err(DomainError::UnknownAgentType(other.to_string())),
        }
    }
}

/// Lifecycle status of an agent.
///
/// `Offline` is only entered by shutdown. Outside of health failures and
/// shutdown, the status after each call is `Busy` when other sessions are
/// still active and `Idle` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Processing,
    Busy,
    Failed,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Processing => "processing",
            AgentStatus::Busy => "busy",
            AgentStatus::Failed => "failed",
            AgentStatus::Offline => "offline",
        }
    }

    /// Whether the agent can take new work in this status.
    pub fn is_available(&self) -> bool {
        !matches!(self, AgentStatus::Failed | AgentStatus::Offline)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_round_trip_names() {
        for agent_type in AgentType::ALL {
            let parsed: AgentType = agent_type.as_str().parse().unwrap();
            assert_eq!(parsed, agent_type);
        }
    }

    #[test]
    fn test_agent_type_aliases() {
        assert_eq!("crisis-safety".parse::<AgentType>().unwrap(), AgentType::CrisisSafety);
        assert_eq!("Cultural".parse::<AgentType>().unwrap(), AgentType::CulturalAdaptation);
        assert!(matches!(
            "therapist".parse::<AgentType>(),
            Err(DomainError::UnknownAgentType(_))
        ));
    }

    #[test]
    fn test_precedence_excludes_crisis() {
        assert!(!AgentType::PRECEDENCE.contains(&AgentType::CrisisSafety));
        assert_eq!(AgentType::PRECEDENCE[0], AgentType::Intake);
    }

    #[test]
    fn test_generated_id_carries_type() {
        let id = AgentId::generate(AgentType::Intake);
        assert!(id.as_str().starts_with("intake-"));
        assert_eq!(id.as_str().len(), "intake-".len() + 8);
    }

    #[test]
    fn test_status_availability() {
        assert!(AgentStatus::Idle.is_available());
        assert!(AgentStatus::Busy.is_available());
        assert!(!AgentStatus::Failed.is_available());
        assert!(!AgentStatus::Offline.is_available());
    }
}
