//! Handoff protocols and quality gates.
//!
//! A protocol is static configuration: an ordered list of steps, the gates
//! checked after them, and an optional rollback procedure. Protocols are
//! picked from a [`ProtocolLibrary`] by trigger reason and never mutated
//! during a run.

use super::session::CollaborationSession;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shared-state keys written by built-in step actions.
pub mod keys {
    pub const OWNER: &str = "owner";
    pub const CONTEXT_TRANSFERRED: &str = "context_transferred";
    pub const TRANSFER_ACK: &str = "transfer_ack";
    pub const TRIGGER_REASON: &str = "trigger_reason";
    pub const CULTURAL_CONTEXT: &str = "cultural_context";
    pub const STATE_SYNCHRONIZED: &str = "state_synchronized";
    pub const STATE_CHECKSUM: &str = "state_checksum";
    pub const TARGET_VALIDATED: &str = "target_validated";
    pub const PARTICIPANTS_NOTIFIED: &str = "participants_notified";
    pub const OWNERSHIP_RESTORED: &str = "ownership_restored";
}

/// Name of the built-in hook that hands the session back to the primary
/// agent during rollback.
pub const RESTORE_OWNERSHIP_HOOK: &str = "restore_ownership";

/// Who performs a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepExecutor {
    From,
    To,
    System,
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Target agent accepts the transferred context
    ContextTransfer,
    /// Merge shared state and record a checksum
    StateSync,
    /// Target agent is available and its breaker admits calls
    Validation,
    /// Publish a notification to participants
    Notification,
    /// Registered hook by name
    Custom(String),
}

impl StepAction {
    pub fn name(&self) -> &str {
        match self {
            StepAction::ContextTransfer => "context_transfer",
            StepAction::StateSync => "state_sync",
            StepAction::Validation => "validation",
            StepAction::Notification => "notification",
            StepAction::Custom(name) => name,
        }
    }
}

/// One step of a handoff protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffStep {
    pub id: String,
    pub name: String,
    pub executor: StepExecutor,
    pub action: StepAction,
    pub timeout_ms: u64,
    /// Extra attempts after the first
    pub retry_count: u32,
    pub critical: bool,
}

impl HandoffStep {
    pub fn new(id: impl Into<String>, executor: StepExecutor, action: StepAction) -> Self {
        let id = id.into();
        Self {
            name: id.replace('_', " "),
            id,
            executor,
            action,
            timeout_ms: 5_000,
            retry_count: 0,
            critical: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A condition checked over session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GateCheck {
    /// The key exists and is not null
    SharedKey(String),
    /// The key holds `true`
    SharedFlag(String),
    /// No critical step has failed so far
    NoCriticalErrors,
    /// At most this many errors are logged
    MaxErrors(usize),
}

impl GateCheck {
    pub fn holds(&self, session: &CollaborationSession) -> bool {
        match self {
            GateCheck::SharedKey(key) => session.shared.get(key).is_some_and(|v| !v.is_null()),
            GateCheck::SharedFlag(key) => session
                .shared
                .get(key)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            GateCheck::NoCriticalErrors => !session.errors.iter().any(|e| e.critical),
            GateCheck::MaxErrors(max) => session.errors.len() <= *max,
        }
    }
}

/// Weighted gate criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCriterion {
    pub name: String,
    pub weight: f64,
    pub check: GateCheck,
}

impl GateCriterion {
    pub fn new(name: impl Into<String>, weight: f64, check: GateCheck) -> Self {
        Self {
            name: name.into(),
            weight: weight.max(0.0),
            check,
        }
    }
}

/// What to do when a gate fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFailureAction {
    /// Re-run the bound step once more; a second failure is critical
    Retry,
    /// Run the rollback procedure, then fail
    Rollback,
    /// Activate supervision and continue
    Escalate,
    /// Fail without rollback
    Abort,
}

impl GateFailureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateFailureAction::Retry => "retry",
            GateFailureAction::Rollback => "rollback",
            GateFailureAction::Escalate => "escalate",
            GateFailureAction::Abort => "abort",
        }
    }
}

/// Check bound to a step by step id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    pub name: String,
    pub step_id: String,
    pub criteria: Vec<GateCriterion>,
    pub pass_threshold: f64,
    pub failure_action: GateFailureAction,
}

/// Result of evaluating one gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub gate: String,
    pub score: f64,
    pub passed: bool,
    pub failed_criteria: Vec<String>,
}

impl QualityGate {
    /// Score = passed weight / total weight; passes iff score ≥ threshold.
    /// A gate with no weight passes.
    pub fn evaluate(&self, session: &CollaborationSession) -> GateEvaluation {
        let total: f64 = self.criteria.iter().map(|c| c.weight).sum();
        let mut passed_weight = 0.0;
        let mut failed_criteria = Vec::new();
        for criterion in &self.criteria {
            if criterion.check.holds(session) {
                passed_weight += criterion.weight;
            } else {
                failed_criteria.push(criterion.name.clone());
            }
        }
        let score = if total > 0.0 { passed_weight / total } else { 1.0 };
        GateEvaluation {
            gate: self.name.clone(),
            score,
            passed: score >= self.pass_threshold,
            failed_criteria,
        }
    }
}

/// Which built-in protocol a trigger reason maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Standard,
    CrisisEscalation,
    CulturalConsultation,
}

const CRISIS_REASONS: &[&str] = &["crisis", "suicid", "self-harm", "harm", "emergency", "safety"];
const CULTURAL_REASONS: &[&str] = &["cultural", "culture", "language"];

impl ProtocolKind {
    /// Crisis reasons win over cultural ones.
    pub fn for_reason(reason: &str) -> Self {
        let reason = reason.to_lowercase();
        if CRISIS_REASONS.iter().any(|k| reason.contains(k)) {
            ProtocolKind::CrisisEscalation
        } else if CULTURAL_REASONS.iter().any(|k| reason.contains(k)) {
            ProtocolKind::CulturalConsultation
        } else {
            ProtocolKind::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Standard => "standard_handoff",
            ProtocolKind::CrisisEscalation => "crisis_escalation",
            ProtocolKind::CulturalConsultation => "cultural_consultation",
        }
    }
}

/// Static handoff procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffProtocol {
    pub name: String,
    pub kind: ProtocolKind,
    pub steps: Vec<HandoffStep>,
    #[serde(default)]
    pub gates: Vec<QualityGate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Vec<HandoffStep>>,
}

impl HandoffProtocol {
    pub fn new(name: impl Into<String>, kind: ProtocolKind, steps: Vec<HandoffStep>) -> Self {
        Self {
            name: name.into(),
            kind,
            steps,
            gates: Vec::new(),
            rollback: None,
        }
    }

    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn with_rollback(mut self, steps: Vec<HandoffStep>) -> Self {
        self.rollback = Some(steps);
        self
    }

    /// Gates bound to a step, in declaration order.
    pub fn gates_for<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a QualityGate> + 'a {
        self.gates.iter().filter(move |g| g.step_id == step_id)
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback.as_ref().is_some_and(|r| !r.is_empty())
    }

    /// Three steps: transfer context, sync state (best effort), validate
    /// the target.
    pub fn standard() -> Self {
        HandoffProtocol::new(
            ProtocolKind::Standard.as_str(),
            ProtocolKind::Standard,
            vec![
                HandoffStep::new("transfer_context", StepExecutor::From, StepAction::ContextTransfer)
                    .with_timeout(Duration::from_secs(30))
                    .with_retries(1),
                HandoffStep::new("sync_state", StepExecutor::System, StepAction::StateSync)
                    .non_critical(),
                HandoffStep::new("validate_target", StepExecutor::To, StepAction::Validation),
            ],
        )
        .with_gate(QualityGate {
            name: "context_integrity".to_string(),
            step_id: "transfer_context".to_string(),
            criteria: vec![GateCriterion::new(
                "context transferred",
                1.0,
                GateCheck::SharedFlag(keys::CONTEXT_TRANSFERRED.to_string()),
            )],
            pass_threshold: 1.0,
            failure_action: GateFailureAction::Retry,
        })
        .with_gate(QualityGate {
            name: "handoff_readiness".to_string(),
            step_id: "validate_target".to_string(),
            criteria: vec![
                GateCriterion::new(
                    "target validated",
                    0.6,
                    GateCheck::SharedFlag(keys::TARGET_VALIDATED.to_string()),
                ),
                GateCriterion::new("no critical errors", 0.4, GateCheck::NoCriticalErrors),
            ],
            pass_threshold: 0.6,
            failure_action: GateFailureAction::Rollback,
        })
        .with_rollback(vec![
            HandoffStep::new(
                RESTORE_OWNERSHIP_HOOK,
                StepExecutor::System,
                StepAction::Custom(RESTORE_OWNERSHIP_HOOK.to_string()),
            ),
            HandoffStep::new("notify_rollback", StepExecutor::System, StepAction::Notification)
                .non_critical(),
        ])
    }

    /// Forward-only: crisis work is never rolled back, a gate failure
    /// brings in supervision instead.
    pub fn crisis_escalation() -> Self {
        HandoffProtocol::new(
            ProtocolKind::CrisisEscalation.as_str(),
            ProtocolKind::CrisisEscalation,
            vec![
                HandoffStep::new("alert_crisis_team", StepExecutor::System, StepAction::Notification)
                    .with_timeout(Duration::from_secs(2))
                    .non_critical(),
                HandoffStep::new("transfer_context", StepExecutor::From, StepAction::ContextTransfer)
                    .with_timeout(Duration::from_secs(15))
                    .with_retries(2),
                HandoffStep::new("validate_crisis_agent", StepExecutor::To, StepAction::Validation),
                HandoffStep::new("sync_safety_state", StepExecutor::System, StepAction::StateSync)
                    .non_critical(),
            ],
        )
        .with_gate(QualityGate {
            name: "crisis_context".to_string(),
            step_id: "transfer_context".to_string(),
            criteria: vec![
                GateCriterion::new(
                    "context transferred",
                    0.7,
                    GateCheck::SharedFlag(keys::CONTEXT_TRANSFERRED.to_string()),
                ),
                GateCriterion::new(
                    "trigger recorded",
                    0.3,
                    GateCheck::SharedKey(keys::TRIGGER_REASON.to_string()),
                ),
            ],
            pass_threshold: 1.0,
            failure_action: GateFailureAction::Escalate,
        })
    }

    pub fn cultural_consultation() -> Self {
        HandoffProtocol::new(
            ProtocolKind::CulturalConsultation.as_str(),
            ProtocolKind::CulturalConsultation,
            vec![
                HandoffStep::new("transfer_context", StepExecutor::From, StepAction::ContextTransfer)
                    .with_timeout(Duration::from_secs(30))
                    .with_retries(1),
                HandoffStep::new("validate_consultant", StepExecutor::To, StepAction::Validation),
                HandoffStep::new("sync_cultural_state", StepExecutor::System, StepAction::StateSync)
                    .non_critical(),
                HandoffStep::new("notify_participants", StepExecutor::System, StepAction::Notification)
                    .non_critical(),
            ],
        )
        .with_gate(QualityGate {
            name: "cultural_context_preserved".to_string(),
            step_id: "transfer_context".to_string(),
            criteria: vec![
                GateCriterion::new(
                    "context transferred",
                    0.5,
                    GateCheck::SharedFlag(keys::CONTEXT_TRANSFERRED.to_string()),
                ),
                GateCriterion::new(
                    "cultural context present",
                    0.5,
                    GateCheck::SharedKey(keys::CULTURAL_CONTEXT.to_string()),
                ),
            ],
            pass_threshold: 1.0,
            failure_action: GateFailureAction::Escalate,
        })
        .with_rollback(vec![HandoffStep::new(
            RESTORE_OWNERSHIP_HOOK,
            StepExecutor::System,
            StepAction::Custom(RESTORE_OWNERSHIP_HOOK.to_string()),
        )])
    }
}

/// The protocols available to the workflow.
#[derive(Debug, Clone)]
pub struct ProtocolLibrary {
    standard: HandoffProtocol,
    crisis: HandoffProtocol,
    cultural: HandoffProtocol,
}

impl Default for ProtocolLibrary {
    fn default() -> Self {
        Self {
            standard: HandoffProtocol::standard(),
            crisis: HandoffProtocol::crisis_escalation(),
            cultural: HandoffProtocol::cultural_consultation(),
        }
    }
}

impl ProtocolLibrary {
    /// Replace one of the protocols. Its `kind` decides the slot.
    pub fn with_protocol(mut self, protocol: HandoffProtocol) -> Self {
        match protocol.kind {
            ProtocolKind::Standard => self.standard = protocol,
            ProtocolKind::CrisisEscalation => self.crisis = protocol,
            ProtocolKind::CulturalConsultation => self.cultural = protocol,
        }
        self
    }

    pub fn get(&self, kind: ProtocolKind) -> &HandoffProtocol {
        match kind {
            ProtocolKind::Standard => &self.standard,
            ProtocolKind::CrisisEscalation => &self.crisis,
            ProtocolKind::CulturalConsultation => &self.cultural,
        }
    }

    pub fn select(&self, trigger_reason: &str) -> &HandoffProtocol {
        self.get(ProtocolKind::for_reason(trigger_reason))
    }
}
