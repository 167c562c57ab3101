//! Merging agent outputs into one reply.

use super::plan::SessionPlan;
use crate::agent::{AgentOutput, AgentType};
use crate::crisis::RiskTier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Next step prepended whenever the round escalates.
pub const ESCALATION_NEXT_STEP: &str =
    "Connect the user with crisis support resources and a human clinician now";

/// Result of synthesizing one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedResponse {
    pub primary_response: String,
    pub coordinated_insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_integration: Option<String>,
    pub next_steps: Vec<String>,
    pub escalation_needed: bool,
    /// Highest tier reported by any output
    pub risk_tier: RiskTier,
    pub contributing_agents: Vec<AgentType>,
}

/// Merge outputs into one response.
///
/// Outputs are ranked by `influence * confidence`. When any output asks
/// for escalation, the best-ranked escalating output leads the reply (a
/// crisis-safety output wins ties) and the others follow it.
pub fn synthesize(outputs: &[AgentOutput], plan: &SessionPlan) -> SynthesizedResponse {
    let mut ranked: Vec<&AgentOutput> = outputs.iter().collect();
    ranked.sort_by(|a, b| b.weight().total_cmp(&a.weight()));

    let escalation_needed = outputs.iter().any(|o| o.escalation_needed);
    let lead = if escalation_needed {
        ranked
            .iter()
            .filter(|o| o.escalation_needed)
            .max_by(|a, b| {
                let a_key = (a.agent_type == AgentType::CrisisSafety, a.weight());
                let b_key = (b.agent_type == AgentType::CrisisSafety, b.weight());
                a_key.0.cmp(&b_key.0).then(a_key.1.total_cmp(&b_key.1))
            })
            .copied()
    } else {
        ranked.first().copied()
    };

    let primary_response = lead
        .map(|o| o.content.trim().to_string())
        .unwrap_or_default();

    let mut coordinated_insights = Vec::new();
    let mut seen = HashSet::new();
    for output in &ranked {
        for insight in &output.key_insights {
            push_unique(&mut coordinated_insights, &mut seen, insight);
        }
    }

    let mut next_steps = Vec::new();
    let mut seen = HashSet::new();
    if escalation_needed {
        push_unique(&mut next_steps, &mut seen, ESCALATION_NEXT_STEP);
    }
    for output in &ranked {
        for recommendation in &output.recommendations {
            push_unique(&mut next_steps, &mut seen, recommendation);
        }
    }

    SynthesizedResponse {
        primary_response,
        coordinated_insights,
        cultural_integration: cultural_note(outputs, plan),
        next_steps,
        escalation_needed,
        risk_tier: outputs
            .iter()
            .map(|o| o.risk_tier)
            .max()
            .unwrap_or_default(),
        contributing_agents: ranked.iter().map(|o| o.agent_type).collect(),
    }
}

fn cultural_note(outputs: &[AgentOutput], plan: &SessionPlan) -> Option<String> {
    let cultural = outputs
        .iter()
        .find(|o| o.agent_type == AgentType::CulturalAdaptation);
    if let Some(output) = cultural {
        if !output.reasoning.trim().is_empty() {
            return Some(output.reasoning.trim().to_string());
        }
        if let Some(first) = output.key_insights.first() {
            return Some(first.clone());
        }
    }
    plan.approach.cultural_adaptations.first().cloned()
}

fn push_unique(list: &mut Vec<String>, seen: &mut HashSet<String>, item: &str) {
    let trimmed = item.trim();
    if trimmed.is_empty() {
        return;
    }
    if seen.insert(trimmed.to_lowercase()) {
        list.push(trimmed.to_string());
    }
}
