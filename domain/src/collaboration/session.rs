//! Collaboration session entity.

use super::context::CollaborationContext;
use super::protocol::{HandoffProtocol, keys};
use crate::agent::AgentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Lifecycle of a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Paused => "paused",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub details: Value,
}

/// One entry of the error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub step_id: String,
    pub step_name: String,
    pub message: String,
    pub critical: bool,
}

/// A running (or finished) handoff between agents.
///
/// Owned by the workflow call that created it; monitoring only ever sees
/// snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub id: String,
    pub context: CollaborationContext,
    pub protocol: HandoffProtocol,
    pub source: AgentType,
    pub target: AgentType,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub current_step: usize,
    pub status: SessionStatus,
    pub participants: Vec<AgentType>,
    pub interactions: Vec<InteractionEntry>,
    pub errors: Vec<ErrorEntry>,
    /// State written by steps
    pub shared: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supervision_ids: Vec<String>,
}

impl CollaborationSession {
    /// Start a session handing over from the context's primary agent to
    /// `target`.
    pub fn new(
        context: CollaborationContext,
        protocol: HandoffProtocol,
        target: AgentType,
        now: DateTime<Utc>,
    ) -> Self {
        let source = context.primary_agent;
        let mut participants = vec![source];
        for agent in std::iter::once(target).chain(context.collaborating_agents.iter().copied()) {
            if !participants.contains(&agent) {
                participants.push(agent);
            }
        }

        let mut shared = context.shared.clone();
        shared.insert(keys::OWNER.to_string(), json!(source.as_str()));

        Self {
            id: format!("collab-{}", uuid::Uuid::new_v4()),
            context,
            protocol,
            source,
            target,
            started_at: now,
            ended_at: None,
            current_step: 0,
            status: SessionStatus::Active,
            participants,
            interactions: Vec::new(),
            errors: Vec::new(),
            shared,
            supervision_ids: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> std::time::Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// Active and running longer than the context allows.
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && self.elapsed(now) > self.context.max_duration()
    }

    pub fn owner(&self) -> Option<&str> {
        self.shared.get(keys::OWNER).and_then(|v| v.as_str())
    }

    pub fn log_interaction(
        &mut self,
        step_id: Option<&str>,
        actor: impl Into<String>,
        action: impl Into<String>,
        details: Value,
        now: DateTime<Utc>,
    ) {
        self.interactions.push(InteractionEntry {
            timestamp: now,
            step_id: step_id.map(str::to_string),
            actor: actor.into(),
            action: action.into(),
            details,
        });
    }

    pub fn log_error(
        &mut self,
        step_id: &str,
        step_name: &str,
        message: impl Into<String>,
        critical: bool,
        now: DateTime<Utc>,
    ) {
        self.errors.push(ErrorEntry {
            timestamp: now,
            step_id: step_id.to_string(),
            step_name: step_name.to_string(),
            message: message.into(),
            critical,
        });
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.finish(SessionStatus::Completed, now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.finish(SessionStatus::Failed, now);
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.finish(SessionStatus::Cancelled, now);
    }

    pub fn pause(&mut self) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == SessionStatus::Paused {
            self.status = SessionStatus::Active;
        }
    }

    fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        if self.is_terminal() {
            return;
        }
        self.status = status;
        self.ended_at = Some(now);
    }
}
