//! Quality assessment of a synthesized round.
//!
//! Five sub-scores in [0, 1] are combined with fixed weights. The scores
//! are heuristics over the agent outputs and the plan; they only need to be
//! deterministic and monotone in the obvious directions (more agents
//! answering, higher confidence, safety agent present).

use super::plan::{RiskLevel, SessionPlan};
use super::synthesis::SynthesizedResponse;
use crate::agent::{AgentOutput, AgentType};
use serde::{Deserialize, Serialize};

/// Sub-score weights. They sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub alliance: f64,
    pub cultural_sensitivity: f64,
    pub evidence_based: f64,
    pub coordination: f64,
    pub safety: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            alliance: 0.2,
            cultural_sensitivity: 0.2,
            evidence_based: 0.2,
            coordination: 0.15,
            safety: 0.25,
        }
    }
}

/// Scores for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub alliance: f64,
    pub cultural_sensitivity: f64,
    pub evidence_based: f64,
    pub coordination_effectiveness: f64,
    pub safety: f64,
    pub overall: f64,
    /// Plan quality checks that were not met
    pub failed_checks: Vec<String>,
    pub escalation_needed: bool,
}

impl QualityAssessment {
    /// Score of a named dimension, as used by plan quality checks.
    pub fn dimension(&self, name: &str) -> Option<f64> {
        match name {
            "alliance" => Some(self.alliance),
            "cultural_sensitivity" => Some(self.cultural_sensitivity),
            "evidence_based" => Some(self.evidence_based),
            "coordination_effectiveness" | "coordination" => Some(self.coordination_effectiveness),
            "safety" => Some(self.safety),
            "overall" => Some(self.overall),
            _ => None,
        }
    }
}

/// Scores synthesized rounds.
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    weights: QualityWeights,
    safety_threshold: f64,
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(super::plan::DEFAULT_SAFETY_THRESHOLD)
    }
}

impl QualityAssessor {
    pub fn new(safety_threshold: f64) -> Self {
        Self {
            weights: QualityWeights::default(),
            safety_threshold: safety_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn safety_threshold(&self) -> f64 {
        self.safety_threshold
    }

    pub fn assess(
        &self,
        outputs: &[AgentOutput],
        synthesis: &SynthesizedResponse,
        plan: &SessionPlan,
    ) -> QualityAssessment {
        let alliance = alliance(outputs, synthesis);
        let cultural_sensitivity = cultural_sensitivity(outputs, plan);
        let evidence_based = evidence_based(outputs);
        let coordination_effectiveness = coordination_effectiveness(outputs, plan);
        let safety = safety(outputs, synthesis, plan);

        let w = &self.weights;
        let overall = (alliance * w.alliance
            + cultural_sensitivity * w.cultural_sensitivity
            + evidence_based * w.evidence_based
            + coordination_effectiveness * w.coordination
            + safety * w.safety)
            .clamp(0.0, 1.0);

        let mut assessment = QualityAssessment {
            alliance,
            cultural_sensitivity,
            evidence_based,
            coordination_effectiveness,
            safety,
            overall,
            failed_checks: Vec::new(),
            escalation_needed: false,
        };

        assessment.failed_checks = plan
            .coordination
            .quality_checks
            .iter()
            .filter(|check| {
                assessment
                    .dimension(&check.dimension)
                    .is_some_and(|score| score < check.minimum)
            })
            .map(|check| check.dimension.clone())
            .collect();

        assessment.escalation_needed = synthesis.escalation_needed
            || overall < self.safety_threshold
            || plan.risk.level == RiskLevel::Critical;
        assessment
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn alliance(outputs: &[AgentOutput], synthesis: &SynthesizedResponse) -> f64 {
    if synthesis.primary_response.is_empty() {
        return 0.0;
    }
    mean(outputs.iter().map(|o| o.confidence)).unwrap_or(0.0)
}

fn cultural_sensitivity(outputs: &[AgentOutput], plan: &SessionPlan) -> f64 {
    if !plan.has_cultural_context() {
        return 1.0;
    }
    outputs
        .iter()
        .find(|o| o.agent_type == AgentType::CulturalAdaptation)
        .map(|o| o.confidence.max(0.5))
        .unwrap_or(0.4)
}

fn evidence_based(outputs: &[AgentOutput]) -> f64 {
    mean(outputs.iter().map(|o| {
        let reasoning = if o.reasoning.trim().is_empty() { 0.0 } else { 0.5 };
        let validated = if o.low_confidence { 0.0 } else { 0.5 };
        reasoning + validated
    }))
    .unwrap_or(0.0)
}

fn coordination_effectiveness(outputs: &[AgentOutput], plan: &SessionPlan) -> f64 {
    let required = plan.coordination.required_agents.len();
    if required == 0 {
        return 1.0;
    }
    let answered = plan
        .coordination
        .required_agents
        .iter()
        .filter(|a| outputs.iter().any(|o| o.agent_type == **a))
        .count();
    answered as f64 / required as f64
}

fn safety(outputs: &[AgentOutput], synthesis: &SynthesizedResponse, plan: &SessionPlan) -> f64 {
    let base = match outputs
        .iter()
        .find(|o| o.agent_type == AgentType::CrisisSafety)
    {
        Some(o) if o.low_confidence => o.confidence * 0.8,
        Some(o) => o.confidence.max(0.5),
        None => 0.3,
    };
    // A high-risk pre-screen that the round did not escalate is unsafe.
    if plan.risk.level >= RiskLevel::High && !synthesis.escalation_needed {
        base.min(0.2)
    } else {
        base
    }
}
