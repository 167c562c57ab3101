//! Session planning for one coordination round.
//!
//! [`SessionPlanner::create_session_plan`] is pure: it looks at the message,
//! the dispatch context and the previous plan of the session (if any) and
//! decides goals, approach, strategy, agents and risk handling. The engine
//! keeps one [`SessionPlan`] per user session and replaces it every round.

use super::strategy::CoordinationStrategy;
use crate::agent::{AgentMessage, AgentType, MessageContext};
use crate::core::error::DomainError;
use crate::crisis::{CrisisAssessment, CrisisFallbackScorer, RiskTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages with fewer words than this do not trigger consensus rounds.
pub const NON_TRIVIAL_WORDS: usize = 5;

/// Default minimum safety sub-score.
pub const DEFAULT_SAFETY_THRESHOLD: f64 = 0.6;

/// Plan-level risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_tier(tier: RiskTier) -> Self {
        match tier {
            RiskTier::Crisis => RiskLevel::Critical,
            RiskTier::High => RiskLevel::High,
            RiskTier::Moderate => RiskLevel::Moderate,
            RiskTier::Low | RiskTier::None => RiskLevel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Risk-management summary attached to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskManagement {
    pub level: RiskLevel,
    /// Tier from the keyword pre-screen
    pub pre_screen_tier: RiskTier,
    pub indicators: Vec<String>,
    pub safety_measures: Vec<String>,
    pub requires_monitoring: bool,
}

impl RiskManagement {
    fn from_assessment(assessment: &CrisisAssessment) -> Self {
        let level = RiskLevel::from_tier(assessment.tier);
        let mut safety_measures = Vec::new();
        if level >= RiskLevel::Moderate {
            safety_measures.push("check in on current safety".to_string());
        }
        if level >= RiskLevel::High {
            safety_measures.push("offer crisis line and emergency resources".to_string());
            safety_measures.push("notify on-call supervisor".to_string());
        }
        Self {
            level,
            pre_screen_tier: assessment.tier,
            indicators: assessment.matched.clone(),
            safety_measures,
            requires_monitoring: level >= RiskLevel::Moderate,
        }
    }
}

/// Descriptor of the therapeutic approach for the round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapeuticApproach {
    pub name: String,
    pub techniques: Vec<String>,
    #[serde(default)]
    pub cultural_adaptations: Vec<String>,
}

/// One ordered dispatch in a coordination plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationStep {
    pub order: u32,
    pub agent_type: AgentType,
    pub task: String,
}

/// Substitute to use when an agent of `failing_agent` type fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackPlan {
    pub failing_agent: AgentType,
    pub substitute: AgentType,
    pub reason: String,
}

/// Minimum score a named quality dimension must reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub dimension: String,
    pub minimum: f64,
}

/// The agent-facing half of a session plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCoordinationPlan {
    pub strategy: CoordinationStrategy,
    pub required_agents: Vec<AgentType>,
    pub steps: Vec<CoordinationStep>,
    pub fallback_plans: Vec<FallbackPlan>,
    pub quality_checks: Vec<QualityCheck>,
}

impl AgentCoordinationPlan {
    /// Steps sorted by ascending order.
    pub fn ordered_steps(&self) -> Vec<&CoordinationStep> {
        let mut steps: Vec<&CoordinationStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    pub fn fallback_for(&self, agent_type: AgentType) -> Option<&FallbackPlan> {
        self.fallback_plans
            .iter()
            .find(|f| f.failing_agent == agent_type)
    }

    pub fn step_for(&self, agent_type: AgentType) -> Option<&CoordinationStep> {
        self.steps.iter().find(|s| s.agent_type == agent_type)
    }
}

/// Plan for one user session, replaced after every coordination round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub session_id: String,
    pub user_id: String,
    pub goals: Vec<String>,
    pub approach: TherapeuticApproach,
    pub coordination: AgentCoordinationPlan,
    pub risk: RiskManagement,
    /// Coordination round this plan was made for (1-based)
    pub round: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_quality_score: Option<f64>,
    pub escalations: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionPlan {
    pub fn strategy(&self) -> CoordinationStrategy {
        self.coordination.strategy
    }

    pub fn has_cultural_context(&self) -> bool {
        !self.approach.cultural_adaptations.is_empty()
    }

    /// Record the outcome of the round this plan drove.
    pub fn record_outcome(&mut self, quality_score: f64, escalated: bool, now: DateTime<Utc>) {
        self.last_quality_score = Some(quality_score);
        if escalated {
            self.escalations += 1;
        }
        self.updated_at = now;
    }
}

/// Builds session plans.
#[derive(Debug, Clone)]
pub struct SessionPlanner {
    scorer: CrisisFallbackScorer,
    strategy_override: Option<String>,
    safety_threshold: f64,
}

impl Default for SessionPlanner {
    fn default() -> Self {
        Self::new(CrisisFallbackScorer::default())
    }
}

impl SessionPlanner {
    pub fn new(scorer: CrisisFallbackScorer) -> Self {
        Self {
            scorer,
            strategy_override: None,
            safety_threshold: DEFAULT_SAFETY_THRESHOLD,
        }
    }

    /// Force a strategy by name. The name is only checked when a plan is
    /// created, so an unknown one fails that round.
    pub fn with_strategy_override(mut self, strategy: Option<String>) -> Self {
        self.strategy_override = strategy;
        self
    }

    pub fn with_safety_threshold(mut self, threshold: f64) -> Self {
        self.safety_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn scorer(&self) -> &CrisisFallbackScorer {
        &self.scorer
    }

    /// Create the plan for the next round of a session.
    pub fn create_session_plan(
        &self,
        message: &AgentMessage,
        context: &MessageContext,
        previous: Option<&SessionPlan>,
        now: DateTime<Utc>,
    ) -> Result<SessionPlan, DomainError> {
        let assessment = self.scorer.score(&message.content);
        let cultural = context
            .cultural_context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let strategy = match &self.strategy_override {
            Some(name) => name.parse::<CoordinationStrategy>()?,
            None => select_strategy(
                assessment.tier,
                previous.is_none(),
                cultural.is_some(),
                &message.content,
            ),
        };

        let required_agents = required_agents(strategy, cultural.is_some());
        let steps = required_agents
            .iter()
            .enumerate()
            .map(|(i, agent_type)| CoordinationStep {
                order: i as u32 + 1,
                agent_type: *agent_type,
                task: task_for(*agent_type, strategy).to_string(),
            })
            .collect();

        let mut quality_checks = vec![QualityCheck {
            dimension: "safety".to_string(),
            minimum: self.safety_threshold,
        }];
        if cultural.is_some() {
            quality_checks.push(QualityCheck {
                dimension: "cultural_sensitivity".to_string(),
                minimum: 0.5,
            });
        }

        let risk = RiskManagement::from_assessment(&assessment);
        let round = previous.map(|p| p.round + 1).unwrap_or(1);

        Ok(SessionPlan {
            session_id: message.session_id.clone(),
            user_id: message.user_id.clone(),
            goals: goals(&risk, previous.is_none(), cultural.is_some()),
            approach: approach(risk.level, previous.is_none(), cultural),
            coordination: AgentCoordinationPlan {
                strategy,
                required_agents,
                steps,
                fallback_plans: default_fallbacks(),
                quality_checks,
            },
            risk,
            round,
            last_quality_score: None,
            escalations: previous.map(|p| p.escalations).unwrap_or(0),
            created_at: previous.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        })
    }
}

/// Strategy selection rules, first match wins.
pub fn select_strategy(
    pre_screen: RiskTier,
    first_turn: bool,
    has_cultural_context: bool,
    content: &str,
) -> CoordinationStrategy {
    if pre_screen >= RiskTier::High {
        CoordinationStrategy::Hierarchical
    } else if first_turn {
        CoordinationStrategy::Sequential
    } else if has_cultural_context && is_non_trivial(content) {
        CoordinationStrategy::Consensus
    } else {
        CoordinationStrategy::Parallel
    }
}

fn is_non_trivial(content: &str) -> bool {
    content.split_whitespace().count() >= NON_TRIVIAL_WORDS
}

fn required_agents(strategy: CoordinationStrategy, cultural: bool) -> Vec<AgentType> {
    match strategy {
        CoordinationStrategy::Sequential => vec![
            AgentType::Intake,
            AgentType::CulturalAdaptation,
            AgentType::ProgressTracking,
            AgentType::CrisisSafety,
        ],
        CoordinationStrategy::Hierarchical => {
            let mut agents = vec![AgentType::CrisisSafety];
            agents.extend(
                AgentType::PRECEDENCE
                    .into_iter()
                    .filter(|a| cultural || *a != AgentType::CulturalAdaptation),
            );
            agents
        }
        CoordinationStrategy::Consensus => vec![
            AgentType::CrisisSafety,
            AgentType::CulturalAdaptation,
            AgentType::ProgressTracking,
            AgentType::Coordination,
        ],
        CoordinationStrategy::Parallel => {
            let mut agents = vec![
                AgentType::CrisisSafety,
                AgentType::ProgressTracking,
                AgentType::Coordination,
            ];
            if cultural {
                agents.insert(1, AgentType::CulturalAdaptation);
            }
            agents
        }
    }
}

fn task_for(agent_type: AgentType, strategy: CoordinationStrategy) -> &'static str {
    match (agent_type, strategy) {
        (AgentType::CrisisSafety, CoordinationStrategy::Hierarchical) => {
            "assess immediate risk before any other response"
        }
        (AgentType::CrisisSafety, CoordinationStrategy::Sequential) => {
            "review the assembled responses for safety concerns"
        }
        (AgentType::CrisisSafety, _) => "screen the message for risk indicators",
        (AgentType::Intake, _) => "understand the presenting concern and history",
        (AgentType::CulturalAdaptation, _) => "adapt the response to the user's cultural context",
        (AgentType::ProgressTracking, _) => "relate this turn to the user's goals and progress",
        (AgentType::Coordination, _) => "propose next steps across the care team",
    }
}

fn default_fallbacks() -> Vec<FallbackPlan> {
    [
        AgentType::Intake,
        AgentType::CulturalAdaptation,
        AgentType::ProgressTracking,
    ]
    .into_iter()
    .map(|failing| FallbackPlan {
        failing_agent: failing,
        substitute: AgentType::Coordination,
        reason: format!("{} unavailable", failing.display_name()),
    })
    .collect()
}

fn goals(risk: &RiskManagement, first_turn: bool, cultural: bool) -> Vec<String> {
    let mut goals = Vec::new();
    if risk.level >= RiskLevel::High {
        goals.push("ensure the user's immediate safety".to_string());
    }
    if first_turn {
        goals.push("build rapport and understand the presenting concern".to_string());
    } else {
        goals.push("support progress toward the user's stated goals".to_string());
    }
    if risk.level == RiskLevel::Moderate {
        goals.push("monitor for escalating distress".to_string());
    }
    if cultural {
        goals.push("respect the user's cultural context".to_string());
    }
    goals
}

fn approach(level: RiskLevel, first_turn: bool, cultural: Option<&str>) -> TherapeuticApproach {
    let (name, techniques): (&str, &[&str]) = if level >= RiskLevel::High {
        (
            "crisis_stabilization",
            &["safety planning", "grounding", "resource linkage"],
        )
    } else if first_turn {
        (
            "person_centered_intake",
            &["reflective listening", "open questions"],
        )
    } else {
        (
            "collaborative_support",
            &["goal review", "behavioral activation", "reflective listening"],
        )
    };
    TherapeuticApproach {
        name: name.to_string(),
        techniques: techniques.iter().map(|t| t.to_string()).collect(),
        cultural_adaptations: cultural
            .map(|c| vec![format!("frame suggestions within: {}", c)])
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> AgentMessage {
        AgentMessage::new("s-1", "u-1", text)
    }

    fn plan(planner: &SessionPlanner, text: &str, context: &MessageContext, previous: Option<&SessionPlan>) -> SessionPlan {
        planner
            .create_session_plan(&message(text), context, previous, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_crisis_pre_screen_selects_hierarchical() {
        let planner = SessionPlanner::default();
        let plan = plan(&planner, "I want to kill myself tonight", &MessageContext::new(), None);
        assert_eq!(plan.strategy(), CoordinationStrategy::Hierarchical);
        assert_eq!(plan.risk.level, RiskLevel::Critical);
        assert_eq!(plan.coordination.ordered_steps()[0].agent_type, AgentType::CrisisSafety);
        assert!(!plan.coordination.required_agents.contains(&AgentType::CulturalAdaptation));
    }

    #[test]
    fn test_first_turn_is_sequential() {
        let planner = SessionPlanner::default();
        let plan = plan(&planner, "hello there", &MessageContext::new(), None);
        assert_eq!(plan.strategy(), CoordinationStrategy::Sequential);
        let order: Vec<AgentType> = plan
            .coordination
            .ordered_steps()
            .iter()
            .map(|s| s.agent_type)
            .collect();
        assert_eq!(
            order,
            vec![
                AgentType::Intake,
                AgentType::CulturalAdaptation,
                AgentType::ProgressTracking,
                AgentType::CrisisSafety
            ]
        );
        assert_eq!(plan.round, 1);
    }

    #[test]
    fn test_cultural_context_selects_consensus_on_later_turns() {
        let planner = SessionPlanner::default();
        let context = MessageContext::new().with_cultural_context("Korean-American, first generation");
        let first = plan(&planner, "hi", &context, None);
        let second = plan(
            &planner,
            "my parents keep asking when I will visit home",
            &context,
            Some(&first),
        );
        assert_eq!(second.strategy(), CoordinationStrategy::Consensus);
        assert_eq!(second.round, 2);
        assert_eq!(second.created_at, first.created_at);

        let short = plan(&planner, "thanks", &context, Some(&second));
        assert_eq!(short.strategy(), CoordinationStrategy::Parallel);
        assert!(short.coordination.required_agents.contains(&AgentType::CulturalAdaptation));
    }

    #[test]
    fn test_later_turn_without_context_is_parallel() {
        let planner = SessionPlanner::default();
        let first = plan(&planner, "hi", &MessageContext::new(), None);
        let second = plan(&planner, "work was fine today I guess", &MessageContext::new(), Some(&first));
        assert_eq!(second.strategy(), CoordinationStrategy::Parallel);
        assert_eq!(second.coordination.required_agents.len(), 3);
    }

    #[test]
    fn test_crisis_safety_always_required() {
        let planner = SessionPlanner::default();
        for strategy in CoordinationStrategy::ALL {
            let planner = planner
                .clone()
                .with_strategy_override(Some(strategy.as_str().to_string()));
            let plan = plan(&planner, "hello", &MessageContext::new(), None);
            assert_eq!(plan.strategy(), strategy);
            assert!(
                plan.coordination.required_agents.contains(&AgentType::CrisisSafety),
                "{}",
                strategy
            );
        }
    }

    #[test]
    fn test_unknown_override_fails() {
        let planner = SessionPlanner::default().with_strategy_override(Some("lottery".to_string()));
        let result = planner.create_session_plan(&message("hello"), &MessageContext::new(), None, Utc::now());
        assert!(matches!(result, Err(DomainError::CoordinationStrategyUnknown(_))));
    }

    #[test]
    fn test_fallbacks_substitute_coordination() {
        let planner = SessionPlanner::default();
        let plan = plan(&planner, "hello", &MessageContext::new(), None);
        let fallback = plan.coordination.fallback_for(AgentType::CulturalAdaptation).unwrap();
        assert_eq!(fallback.substitute, AgentType::Coordination);
        assert!(plan.coordination.fallback_for(AgentType::CrisisSafety).is_none());
    }

    #[test]
    fn test_record_outcome() {
        let planner = SessionPlanner::default();
        let mut plan = plan(&planner, "hello", &MessageContext::new(), None);
        plan.record_outcome(0.72, true, Utc::now());
        assert_eq!(plan.last_quality_score, Some(0.72));
        assert_eq!(plan.escalations, 1);
    }
}
