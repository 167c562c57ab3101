//! Supervision protocols and records.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supervisor assigned when the caller names none.
pub const ON_CALL_SUPERVISOR: &str = "on_call_supervisor";

/// Depth of supervisor involvement, least to most.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionLevel {
    #[default]
    Consultation,
    Review,
    Direct,
    Emergency,
}

impl SupervisionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisionLevel::Consultation => "consultation",
            SupervisionLevel::Review => "review",
            SupervisionLevel::Direct => "direct",
            SupervisionLevel::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for SupervisionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SupervisionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "consultation" | "consult" => Ok(SupervisionLevel::Consultation),
            "review" => Ok(SupervisionLevel::Review),
            "direct" => Ok(SupervisionLevel::Direct),
            "emergency" => Ok(SupervisionLevel::Emergency),
            other => Err(format!("unknown supervision level: {}", other)),
        }
    }
}

/// One thing a supervisor does when a protocol activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionProcedure {
    pub name: String,
    pub description: String,
    pub requires_human: bool,
}

impl InterventionProcedure {
    fn new(name: &str, description: &str, requires_human: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            requires_human,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisionProtocol {
    pub name: String,
    pub level: SupervisionLevel,
    /// Lowercase keywords matched against the activation reason
    pub reasons: Vec<String>,
    pub procedures: Vec<InterventionProcedure>,
    pub response_time_minutes: u32,
}

impl SupervisionProtocol {
    pub fn matches_reason(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        self.reasons.iter().any(|k| reason.contains(k.as_str()))
    }

    /// Built-in protocols, one per level.
    pub fn defaults() -> Vec<SupervisionProtocol> {
        vec![
            SupervisionProtocol {
                name: "peer_consultation".to_string(),
                level: SupervisionLevel::Consultation,
                reasons: vec!["consult".into(), "question".into(), "uncertain".into()],
                procedures: vec![InterventionProcedure::new(
                    "log_consultation",
                    "record the question for the next supervision meeting",
                    false,
                )],
                response_time_minutes: 24 * 60,
            },
            SupervisionProtocol {
                name: "case_review".to_string(),
                level: SupervisionLevel::Review,
                reasons: vec!["quality".into(), "review".into(), "gate".into()],
                procedures: vec![
                    InterventionProcedure::new(
                        "flag_for_review",
                        "queue the session transcript for clinical review",
                        false,
                    ),
                    InterventionProcedure::new(
                        "notify_supervisor",
                        "send the assigned supervisor a summary",
                        false,
                    ),
                ],
                response_time_minutes: 4 * 60,
            },
            SupervisionProtocol {
                name: "direct_supervision".to_string(),
                level: SupervisionLevel::Direct,
                reasons: vec!["complex".into(), "handoff".into(), "cultural".into()],
                procedures: vec![
                    InterventionProcedure::new(
                        "notify_supervisor",
                        "send the assigned supervisor a summary",
                        false,
                    ),
                    InterventionProcedure::new(
                        "supervisor_joins_session",
                        "supervisor monitors the live session",
                        true,
                    ),
                ],
                response_time_minutes: 30,
            },
            SupervisionProtocol {
                name: "crisis_intervention".to_string(),
                level: SupervisionLevel::Emergency,
                reasons: vec![
                    "crisis".into(),
                    "suicid".into(),
                    "harm".into(),
                    "emergency".into(),
                    "safety".into(),
                ],
                procedures: vec![
                    InterventionProcedure::new(
                        "page_on_call",
                        "page the on-call clinician immediately",
                        true,
                    ),
                    InterventionProcedure::new(
                        "share_crisis_resources",
                        "surface crisis line and emergency contacts to the user",
                        false,
                    ),
                    InterventionProcedure::new(
                        "supervisor_takes_over",
                        "supervisor takes ownership of the session",
                        true,
                    ),
                ],
                response_time_minutes: 5,
            },
        ]
    }
}

/// Pick the protocol for a reason and requested level.
///
/// Order: reason and level both match; a protocol at exactly the level; the
/// highest protocol at or below the level (reason-matching ones first); the
/// consultation protocol. `None` only for an empty list.
pub fn match_protocol<'a>(
    protocols: &'a [SupervisionProtocol],
    reason: &str,
    level: SupervisionLevel,
) -> Option<&'a SupervisionProtocol> {
    if let Some(p) = protocols
        .iter()
        .find(|p| p.level == level && p.matches_reason(reason))
    {
        return Some(p);
    }
    if let Some(p) = protocols.iter().find(|p| p.level == level) {
        return Some(p);
    }
    let below = |matching: bool| {
        protocols
            .iter()
            .filter(|p| p.level <= level && (!matching || p.matches_reason(reason)))
            .max_by_key(|p| p.level)
    };
    below(true)
        .or_else(|| below(false))
        .or_else(|| {
            protocols
                .iter()
                .find(|p| p.level == SupervisionLevel::Consultation)
        })
        .or_else(|| protocols.first())
}

/// Procedure applied during an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedProcedure {
    pub name: String,
    pub requires_human: bool,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// Record of one supervision activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisionRecord {
    pub id: String,
    pub session_id: String,
    pub reason: String,
    pub requested_level: SupervisionLevel,
    pub protocol: String,
    pub level: SupervisionLevel,
    pub supervisor: String,
    pub procedures: Vec<AppliedProcedure>,
    pub activated_at: chrono::DateTime<chrono::Utc>,
}

impl SupervisionRecord {
    pub fn requires_human(&self) -> bool {
        self.procedures.iter().any(|p| p.requires_human)
    }
}
