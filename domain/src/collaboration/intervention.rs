//! Joint interventions: several agents working one case as a step graph.

use super::context::{CollaborationContext, UrgencyLevel};
use super::graph::DependencyNode;
use crate::agent::{AgentOutput, AgentType};
use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of joint intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    CrisisTeam,
    ComplexCase,
    CulturalConsultation,
    CarePlanning,
}

impl InterventionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionType::CrisisTeam => "crisis_team",
            InterventionType::ComplexCase => "complex_case",
            InterventionType::CulturalConsultation => "cultural_consultation",
            InterventionType::CarePlanning => "care_planning",
        }
    }

    /// Agent types preferred as leader, best first.
    fn leader_preference(&self) -> &'static [AgentType] {
        match self {
            InterventionType::CrisisTeam => &[AgentType::CrisisSafety, AgentType::Coordination],
            InterventionType::ComplexCase => &[AgentType::Coordination, AgentType::Intake],
            InterventionType::CulturalConsultation => {
                &[AgentType::CulturalAdaptation, AgentType::Coordination]
            }
            InterventionType::CarePlanning => {
                &[AgentType::ProgressTracking, AgentType::Coordination]
            }
        }
    }

    fn success_criteria(&self) -> Vec<String> {
        let criteria: &[&str] = match self {
            InterventionType::CrisisTeam => &[
                "immediate safety assessed",
                "crisis resources offered",
                "supervisor informed",
            ],
            InterventionType::ComplexCase => {
                &["shared case formulation", "coordinated care plan"]
            }
            InterventionType::CulturalConsultation => &[
                "cultural factors identified",
                "approach adapted to cultural context",
            ],
            InterventionType::CarePlanning => &["goals agreed", "next steps assigned"],
        };
        criteria.iter().map(|c| c.to_string()).collect()
    }
}

impl std::fmt::Display for InterventionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InterventionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "crisis_team" | "crisis" => Ok(InterventionType::CrisisTeam),
            "complex_case" | "complex" => Ok(InterventionType::ComplexCase),
            "cultural_consultation" | "cultural" => Ok(InterventionType::CulturalConsultation),
            "care_planning" | "planning" => Ok(InterventionType::CarePlanning),
            other => Err(format!("unknown intervention type: {}", other)),
        }
    }
}

/// How intervention steps are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
    Hybrid,
}

impl ExecutionMode {
    /// `critical` urgency or a crisis team runs everything at once; complex
    /// cases run in dependency phases; everything else is a chain.
    pub fn select(intervention_type: InterventionType, urgency: UrgencyLevel) -> Self {
        if urgency == UrgencyLevel::Critical || intervention_type == InterventionType::CrisisTeam {
            ExecutionMode::Parallel
        } else if intervention_type == InterventionType::ComplexCase {
            ExecutionMode::Hybrid
        } else {
            ExecutionMode::Sequential
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Planning,
    Executing,
    Completed,
    Failed,
}

/// One agent's part of the intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionStep {
    pub id: String,
    pub agent_type: AgentType,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl DependencyNode for InterventionStep {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionStepResult {
    pub step_id: String,
    pub agent_type: AgentType,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<AgentOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A multi-agent task executed as a dependency-ordered step graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointIntervention {
    pub id: String,
    pub session_id: String,
    pub participants: Vec<AgentType>,
    pub intervention_type: InterventionType,
    pub mode: ExecutionMode,
    pub leader: AgentType,
    pub steps: Vec<InterventionStep>,
    pub success_criteria: Vec<String>,
    pub timeout_ms: u64,
    pub status: InterventionStatus,
    pub results: Vec<InterventionStepResult>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JointIntervention {
    /// Build the step plan: one step per distinct agent, leader first.
    ///
    /// Dependencies follow the mode. Sequential plans chain each step to the
    /// one before it, parallel plans have none, and hybrid plans make the
    /// leader's step a dependency of every other step.
    pub fn plan(
        agents: &[AgentType],
        intervention_type: InterventionType,
        context: &CollaborationContext,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut participants: Vec<AgentType> = Vec::new();
        for agent in agents {
            if !participants.contains(agent) {
                participants.push(*agent);
            }
        }
        if participants.len() < 2 {
            return Err(DomainError::InsufficientParticipants(participants.len()));
        }

        let leader = intervention_type
            .leader_preference()
            .iter()
            .find(|a| participants.contains(*a))
            .copied()
            .unwrap_or(participants[0]);
        participants.retain(|a| *a != leader);
        participants.insert(0, leader);

        let mode = ExecutionMode::select(intervention_type, context.urgency);
        let ids: Vec<String> = participants
            .iter()
            .enumerate()
            .map(|(i, a)| format!("step-{}-{}", i + 1, a.as_str()))
            .collect();

        let steps = participants
            .iter()
            .enumerate()
            .map(|(i, agent)| {
                let dependencies = match mode {
                    ExecutionMode::Parallel => Vec::new(),
                    ExecutionMode::Sequential if i > 0 => vec![ids[i - 1].clone()],
                    ExecutionMode::Hybrid if i > 0 => vec![ids[0].clone()],
                    _ => Vec::new(),
                };
                InterventionStep {
                    id: ids[i].clone(),
                    agent_type: *agent,
                    description: step_description(*agent, intervention_type, i == 0),
                    dependencies,
                }
            })
            .collect();

        Ok(Self {
            id: format!("intervention-{}", uuid::Uuid::new_v4()),
            session_id: context.session_id.clone(),
            participants,
            intervention_type,
            mode,
            leader,
            steps,
            success_criteria: intervention_type.success_criteria(),
            timeout_ms: context.max_duration_ms,
            status: InterventionStatus::Planning,
            results: Vec::new(),
            created_at: now,
            completed_at: None,
        })
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    pub fn step(&self, step_id: &str) -> Option<&InterventionStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn start(&mut self) {
        self.status = InterventionStatus::Executing;
    }

    pub fn record_result(&mut self, result: InterventionStepResult) {
        self.results.push(result);
    }

    /// Completed iff every step ran and succeeded.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        let all_ok = self.results.len() == self.steps.len() && self.results.iter().all(|r| r.success);
        self.status = if all_ok {
            InterventionStatus::Completed
        } else {
            InterventionStatus::Failed
        };
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = InterventionStatus::Failed;
        self.completed_at = Some(now);
    }

    pub fn successful_results(&self) -> impl Iterator<Item = &InterventionStepResult> {
        self.results.iter().filter(|r| r.success)
    }
}

fn step_description(agent: AgentType, kind: InterventionType, leading: bool) -> String {
    let role = if leading { "lead" } else { "contribute to" };
    format!("{} the {} from the {} perspective", role, kind.as_str().replace('_', " "), agent.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::context::WorkflowType;
    use crate::collaboration::graph::{dependency_phases, topological_order};

    fn context(urgency: UrgencyLevel) -> CollaborationContext {
        CollaborationContext::new(
            "s",
            "u",
            AgentType::Coordination,
            WorkflowType::JointIntervention,
            "case review",
        )
        .with_urgency(urgency)
    }

    #[test]
    fn test_requires_two_distinct_agents() {
        let err = JointIntervention::plan(
            &[AgentType::Intake, AgentType::Intake],
            InterventionType::CarePlanning,
            &context(UrgencyLevel::Low),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::InsufficientParticipants(1));
    }

    #[test]
    fn test_mode_selection() {
        use ExecutionMode::*;
        use InterventionType::*;
        assert_eq!(ExecutionMode::select(CrisisTeam, UrgencyLevel::Low), Parallel);
        assert_eq!(ExecutionMode::select(CarePlanning, UrgencyLevel::Critical), Parallel);
        assert_eq!(ExecutionMode::select(ComplexCase, UrgencyLevel::High), Hybrid);
        assert_eq!(ExecutionMode::select(CulturalConsultation, UrgencyLevel::Medium), Sequential);
    }

    #[test]
    fn test_sequential_plan_is_a_chain_led_by_preferred_agent() {
        let plan = JointIntervention::plan(
            &[AgentType::Intake, AgentType::ProgressTracking, AgentType::Coordination],
            InterventionType::CarePlanning,
            &context(UrgencyLevel::Medium),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.mode, ExecutionMode::Sequential);
        assert_eq!(plan.leader, AgentType::ProgressTracking);
        assert_eq!(plan.steps[0].agent_type, AgentType::ProgressTracking);
        assert!(plan.steps[0].dependencies.is_empty());
        assert_eq!(plan.steps[2].dependencies, vec![plan.steps[1].id.clone()]);
        assert_eq!(topological_order(&plan.steps).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_crisis_team_steps_are_independent() {
        let plan = JointIntervention::plan(
            &[AgentType::Intake, AgentType::CrisisSafety],
            InterventionType::CrisisTeam,
            &context(UrgencyLevel::Low),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.leader, AgentType::CrisisSafety);
        assert!(plan.steps.iter().all(|s| s.dependencies.is_empty()));
    }

    #[test]
    fn test_complex_case_leader_gates_the_rest() {
        let plan = JointIntervention::plan(
            &[AgentType::Intake, AgentType::Coordination, AgentType::CulturalAdaptation],
            InterventionType::ComplexCase,
            &context(UrgencyLevel::Medium),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.mode, ExecutionMode::Hybrid);
        assert_eq!(plan.leader, AgentType::Coordination);
        assert_eq!(dependency_phases(&plan.steps).unwrap(), vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_finish_requires_all_steps() {
        let mut plan = JointIntervention::plan(
            &[AgentType::Intake, AgentType::Coordination],
            InterventionType::CarePlanning,
            &context(UrgencyLevel::Medium),
            Utc::now(),
        )
        .unwrap();
        plan.start();
        plan.record_result(InterventionStepResult {
            step_id: plan.steps[0].id.clone(),
            agent_type: plan.steps[0].agent_type,
            success: true,
            output: None,
            error: None,
            duration_ms: 5,
        });
        plan.finish(Utc::now());
        assert_eq!(plan.status, InterventionStatus::Failed);
    }
}
