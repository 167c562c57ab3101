//! Handoff execution for CollaborationWorkflow.

use super::error::{CollaborationError, StepError};
use super::workflow::{CollaborationWorkflow, shared_context};
use crate::ports::observer::{CHANNEL_PREFIX, CoordinationEvent};
use chrono::Utc;
use council_domain::collaboration::keys;
use council_domain::{
    AgentMessage, AgentPromptTemplate, AgentType, CollaborationContext, CollaborationSession,
    GateFailureAction, HandoffStep, ProtocolKind, QualityGate, StepAction, StepExecutor,
    SupervisionLevel,
};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

impl CollaborationWorkflow {
    /// Hand the case from `from` to `to`.
    ///
    /// The protocol is picked from the context's trigger reason. Returns the
    /// completed session, or an error once the session has been failed and
    /// archived.
    pub async fn initiate_handoff(
        &self,
        from: AgentType,
        to: AgentType,
        context: CollaborationContext,
    ) -> Result<CollaborationSession, CollaborationError> {
        for agent in [from, to] {
            if !self.registry.contains(agent) {
                return Err(CollaborationError::AgentNotRegistered(agent));
            }
        }

        let mut context = context;
        context.primary_agent = from;
        let protocol = self.protocols.select(&context.trigger_reason).clone();
        let mut session = CollaborationSession::new(context, protocol, to, Utc::now());

        info!(
            collaboration = %session.id,
            session = %session.context.session_id,
            protocol = %session.protocol.name,
            from = %from,
            to = %to,
            "Starting handoff"
        );
        self.track(&session);
        self.observer.on_event(&CoordinationEvent::SessionStarted {
            collaboration_id: session.id.clone(),
            session_id: session.context.session_id.clone(),
            protocol: session.protocol.name.clone(),
            from,
            to,
        });

        if session.protocol.kind == ProtocolKind::CrisisEscalation {
            let reason = session.context.trigger_reason.clone();
            self.supervise(&mut session, &reason, SupervisionLevel::Emergency);
        } else if session.context.requires_human_oversight {
            let reason = format!("human oversight review: {}", session.context.trigger_reason);
            self.supervise(&mut session, &reason, SupervisionLevel::Review);
        }

        let steps = session.protocol.steps.clone();
        for (index, step) in steps.iter().enumerate() {
            session.current_step = index;

            if session.is_timed_out(Utc::now()) {
                let reason = format!(
                    "exceeded maximum duration of {:?}",
                    session.context.max_duration()
                );
                session.log_error(&step.id, &step.name, &reason, true, Utc::now());
                self.terminate(&mut session, &reason, false).await;
                return Err(CollaborationError::HandoffFailure {
                    session_id: session.id,
                    step: step.id.clone(),
                    reason,
                });
            }

            match self.run_step(&mut session, step).await {
                Ok(attempts) => self.step_completed(&mut session, step, attempts),
                Err(e) => {
                    let reason = e.to_string();
                    self.step_failed(&mut session, step, &reason);
                    if step.critical {
                        self.terminate(&mut session, &reason, true).await;
                        return Err(CollaborationError::HandoffFailure {
                            session_id: session.id,
                            step: step.id.clone(),
                            reason,
                        });
                    }
                    self.track(&session);
                    continue;
                }
            }

            self.check_gates(&mut session, step).await?;
            self.track(&session);
        }

        session.complete(Utc::now());
        let duration_ms = session.elapsed(Utc::now()).as_millis() as u64;
        info!(
            collaboration = %session.id,
            errors = session.errors.len(),
            duration_ms,
            "Handoff completed"
        );
        self.observer.on_event(&CoordinationEvent::SessionCompleted {
            collaboration_id: session.id.clone(),
            duration_ms,
        });
        self.archive(&session);
        Ok(session)
    }

    /// Evaluate the gates bound to `step` and apply their failure actions.
    async fn check_gates(
        &self,
        session: &mut CollaborationSession,
        step: &HandoffStep,
    ) -> Result<(), CollaborationError> {
        let gates: Vec<QualityGate> = session.protocol.gates_for(&step.id).cloned().collect();

        for gate in gates {
            let evaluation = gate.evaluate(session);
            if evaluation.passed {
                continue;
            }

            warn!(
                collaboration = %session.id,
                gate = %gate.name,
                score = evaluation.score,
                failed = ?evaluation.failed_criteria,
                action = gate.failure_action.as_str(),
                "Quality gate failed"
            );
            self.observer.on_event(&CoordinationEvent::QualityGateFailed {
                collaboration_id: session.id.clone(),
                gate: gate.name.clone(),
                score: evaluation.score,
                action: gate.failure_action,
            });

            let (score, rollback) = match gate.failure_action {
                GateFailureAction::Escalate => {
                    let reason = format!(
                        "quality gate {} failed during {} handoff: {}",
                        gate.name, session.protocol.name, session.context.trigger_reason
                    );
                    let level = escalation_level(session.protocol.kind);
                    self.supervise(session, &reason, level);
                    continue;
                }
                GateFailureAction::Retry => {
                    let retried = self.attempt(session, step).await;
                    let again = gate.evaluate(session);
                    if retried.is_ok() && again.passed {
                        debug!(collaboration = %session.id, gate = %gate.name, "Gate passed on retry");
                        continue;
                    }
                    (again.score, true)
                }
                GateFailureAction::Rollback => (evaluation.score, true),
                GateFailureAction::Abort => (evaluation.score, false),
            };

            let reason = format!("quality gate {} failed (score {:.2})", gate.name, score);
            session.log_error(&step.id, &step.name, &reason, true, Utc::now());
            self.terminate(session, &reason, rollback).await;
            return Err(CollaborationError::QualityGateFailure {
                gate: gate.name,
                score,
            });
        }
        Ok(())
    }

    /// Fail the session, optionally running the protocol's rollback first.
    async fn terminate(&self, session: &mut CollaborationSession, reason: &str, rollback: bool) {
        if rollback && session.protocol.has_rollback() {
            self.rollback(session).await;
        }
        session.fail(Utc::now());
        error!(collaboration = %session.id, reason = %reason, "Handoff failed");
        self.observer.on_event(&CoordinationEvent::SessionFailed {
            collaboration_id: session.id.clone(),
            reason: reason.to_string(),
        });
        self.archive(session);
    }

    /// Run rollback steps in order. Failures are logged and do not stop
    /// the remaining steps.
    async fn rollback(&self, session: &mut CollaborationSession) {
        let steps = session.protocol.rollback.clone().unwrap_or_default();
        info!(collaboration = %session.id, steps = steps.len(), "Rolling back handoff");
        for step in &steps {
            match self.run_step(session, step).await {
                Ok(_) => session.log_interaction(
                    Some(&step.id),
                    executor_name(session, step),
                    "rollback",
                    json!({ "action": step.action.name() }),
                    Utc::now(),
                ),
                Err(e) => {
                    warn!(collaboration = %session.id, step = %step.id, error = %e, "Rollback step failed");
                    session.log_error(&step.id, &step.name, e.to_string(), false, Utc::now());
                }
            }
        }
    }

    fn step_completed(&self, session: &mut CollaborationSession, step: &HandoffStep, attempts: u32) {
        debug!(collaboration = %session.id, step = %step.id, attempts, "Step completed");
        session.log_interaction(
            Some(&step.id),
            executor_name(session, step),
            step.action.name(),
            json!({ "attempts": attempts }),
            Utc::now(),
        );
        self.observer.on_event(&CoordinationEvent::StepCompleted {
            collaboration_id: session.id.clone(),
            step_id: step.id.clone(),
            attempts,
        });
    }

    fn step_failed(&self, session: &mut CollaborationSession, step: &HandoffStep, reason: &str) {
        warn!(
            collaboration = %session.id,
            step = %step.id,
            critical = step.critical,
            error = %reason,
            "Step failed"
        );
        session.log_error(&step.id, &step.name, reason, step.critical, Utc::now());
        self.observer.on_event(&CoordinationEvent::StepFailed {
            collaboration_id: session.id.clone(),
            step_id: step.id.clone(),
            critical: step.critical,
            error: reason.to_string(),
        });
    }

    // ==================== Step Actions ====================

    /// Run a step with its retries. Returns the number of attempts used.
    async fn run_step(
        &self,
        session: &mut CollaborationSession,
        step: &HandoffStep,
    ) -> Result<u32, StepError> {
        let attempts = step.retry_count + 1;
        let mut last_error = StepError::Failed("step did not run".to_string());
        for attempt in 1..=attempts {
            match self.attempt(session, step).await {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    if attempt < attempts {
                        debug!(
                            collaboration = %session.id,
                            step = %step.id,
                            attempt,
                            max_attempts = attempts,
                            error = %e,
                            "Retrying step"
                        );
                    }
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// One attempt, raced against the step's timeout.
    async fn attempt(
        &self,
        session: &mut CollaborationSession,
        step: &HandoffStep,
    ) -> Result<(), StepError> {
        let timeout = step.timeout();
        match tokio::time::timeout(timeout, self.perform(session, step)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout(timeout)),
        }
    }

    async fn perform(
        &self,
        session: &mut CollaborationSession,
        step: &HandoffStep,
    ) -> Result<(), StepError> {
        match &step.action {
            StepAction::ContextTransfer => self.transfer_context(session).await,
            StepAction::StateSync => {
                sync_state(session);
                Ok(())
            }
            StepAction::Validation => self.validate_target(session),
            StepAction::Notification => {
                self.notify(session, step);
                Ok(())
            }
            StepAction::Custom(name) => {
                let hook = self
                    .hooks
                    .get(name)
                    .ok_or_else(|| StepError::UnknownHook(name.clone()))?;
                hook.run(session).await.map_err(StepError::Failed)
            }
        }
    }

    /// The target agent accepts the case through its envelope.
    async fn transfer_context(&self, session: &mut CollaborationSession) -> Result<(), StepError> {
        let target = session.target;
        let agent = self
            .registry
            .get(target)
            .ok_or(StepError::AgentMissing(target))?;

        let reason = session.context.trigger_reason.clone();
        let message = AgentMessage::new(
            session.context.session_id.clone(),
            session.context.user_id.clone(),
            AgentPromptTemplate::handoff(session.source, &reason),
        );
        let context = shared_context(
            &session.shared,
            &format!("accept the case from the {} agent", session.source.display_name()),
        );
        let response = agent.process_message(&message, &context).await?;

        let shared = &mut session.shared;
        shared.insert(keys::CONTEXT_TRANSFERRED.to_string(), json!(true));
        shared.insert(keys::TRANSFER_ACK.to_string(), json!(response.output.content));
        shared.insert(keys::TRIGGER_REASON.to_string(), json!(reason));
        shared.insert(keys::OWNER.to_string(), json!(target.as_str()));
        Ok(())
    }

    fn validate_target(&self, session: &mut CollaborationSession) -> Result<(), StepError> {
        let target = session.target;
        let agent = self
            .registry
            .get(target)
            .ok_or(StepError::AgentMissing(target))?;
        if !agent.is_available(Utc::now()) {
            return Err(StepError::Failed(format!(
                "{} agent is not available ({})",
                target,
                agent.status()
            )));
        }
        session
            .shared
            .insert(keys::TARGET_VALIDATED.to_string(), json!(true));
        Ok(())
    }

    fn notify(&self, session: &mut CollaborationSession, step: &HandoffStep) {
        let channel = format!("{}.handoff.{}", CHANNEL_PREFIX, step.id);
        let participants: Vec<&str> = session.participants.iter().map(|a| a.as_str()).collect();
        let delivered = self.bus.publish(
            &channel,
            json!({
                "collaboration_id": session.id,
                "session_id": session.context.session_id,
                "protocol": session.protocol.name,
                "participants": participants,
                "owner": session.owner(),
                "reason": session.context.trigger_reason,
            }),
        );
        debug!(collaboration = %session.id, channel = %channel, delivered, "Participants notified");
        session
            .shared
            .insert(keys::PARTICIPANTS_NOTIFIED.to_string(), json!(true));
    }
}

/// Merge context data the session does not have yet and record a summary
/// of the resulting state.
fn sync_state(session: &mut CollaborationSession) {
    for (key, value) in &session.context.shared {
        if !session.shared.contains_key(key) {
            session.shared.insert(key.clone(), value.clone());
        }
    }
    let checksum = state_checksum(&session.shared);

    session
        .shared
        .insert(keys::STATE_SYNCHRONIZED.to_string(), json!(true));
    session
        .shared
        .insert(keys::STATE_CHECKSUM.to_string(), json!(checksum));
}

/// SHA-256 of the shared state's JSON. Keys serialize in sorted order, so
/// equal states give equal checksums across runs and builds.
fn state_checksum(shared: &Map<String, Value>) -> String {
    let encoded = Value::Object(shared.clone()).to_string();
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

fn executor_name(session: &CollaborationSession, step: &HandoffStep) -> String {
    match step.executor {
        StepExecutor::From => session.source.as_str().to_string(),
        StepExecutor::To => session.target.as_str().to_string(),
        StepExecutor::System => "system".to_string(),
    }
}

fn escalation_level(kind: ProtocolKind) -> SupervisionLevel {
    match kind {
        ProtocolKind::CrisisEscalation => SupervisionLevel::Emergency,
        ProtocolKind::CulturalConsultation => SupervisionLevel::Direct,
        ProtocolKind::Standard => SupervisionLevel::Review,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_checksum_is_stable() {
        let mut shared = Map::new();
        shared.insert("topic".to_string(), json!("sleep"));
        shared.insert("mood".to_string(), json!("low"));
        assert_eq!(
            state_checksum(&shared),
            "062e9630cec54220c3d45ffb7806cc25c303080f069352007faaf9cb4612403d"
        );

        let mut reordered = Map::new();
        reordered.insert("mood".to_string(), json!("low"));
        reordered.insert("topic".to_string(), json!("sleep"));
        assert_eq!(state_checksum(&reordered), state_checksum(&shared));
    }
}
