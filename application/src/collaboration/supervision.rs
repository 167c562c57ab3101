//! Supervision activation for CollaborationWorkflow.

use super::error::CollaborationError;
use super::workflow::CollaborationWorkflow;
use crate::ports::escalation::{EscalationHandler, EscalationRequest};
use crate::ports::observer::CoordinationEvent;
use async_trait::async_trait;
use chrono::Utc;
use council_domain::collaboration::{AppliedProcedure, ON_CALL_SUPERVISOR, match_protocol};
use council_domain::{CollaborationSession, SupervisionLevel, SupervisionRecord};
use serde_json::json;
use tracing::{error, info};

impl CollaborationWorkflow {
    /// Bring a supervisor into a care session.
    ///
    /// The protocol is matched by reason and level; `supervisor` defaults to
    /// the on-call supervisor. Every procedure of the protocol is applied
    /// and reported.
    pub fn activate_supervision(
        &self,
        session_id: &str,
        reason: &str,
        level: SupervisionLevel,
        supervisor: Option<&str>,
    ) -> Result<SupervisionRecord, CollaborationError> {
        let protocol = match_protocol(&self.supervision_protocols, reason, level)
            .ok_or_else(|| CollaborationError::SupervisionUnavailable(reason.to_string()))?;

        let now = Utc::now();
        let record = SupervisionRecord {
            id: format!("supervision-{}", uuid::Uuid::new_v4()),
            session_id: session_id.to_string(),
            reason: reason.to_string(),
            requested_level: level,
            protocol: protocol.name.clone(),
            level: protocol.level,
            supervisor: supervisor.unwrap_or(ON_CALL_SUPERVISOR).to_string(),
            procedures: protocol
                .procedures
                .iter()
                .map(|p| AppliedProcedure {
                    name: p.name.clone(),
                    requires_human: p.requires_human,
                    applied_at: now,
                })
                .collect(),
            activated_at: now,
        };

        info!(
            session = %session_id,
            supervision = %record.id,
            protocol = %record.protocol,
            requested = %level,
            level = %record.level,
            supervisor = %record.supervisor,
            "Supervision activated"
        );
        self.observer.on_event(&CoordinationEvent::SupervisionActivated {
            session_id: session_id.to_string(),
            supervision_id: record.id.clone(),
            protocol: record.protocol.clone(),
            level: record.level,
            supervisor: record.supervisor.clone(),
        });
        for procedure in &record.procedures {
            self.observer.on_event(&CoordinationEvent::ProcedureApplied {
                supervision_id: record.id.clone(),
                procedure: procedure.name.clone(),
                requires_human: procedure.requires_human,
            });
        }

        let retention = self.config.history_retention;
        let mut state = self.lock();
        state.supervision.push_back(record.clone());
        while state.supervision.len() > retention {
            state.supervision.pop_front();
        }
        Ok(record)
    }

    /// Activate supervision for a running handoff and note it on the session.
    pub(super) fn supervise(
        &self,
        session: &mut CollaborationSession,
        reason: &str,
        level: SupervisionLevel,
    ) {
        match self.activate_supervision(&session.context.session_id, reason, level, None) {
            Ok(record) => {
                session.log_interaction(
                    None,
                    record.supervisor.clone(),
                    "supervision_activated",
                    json!({
                        "supervision_id": record.id,
                        "protocol": record.protocol,
                        "level": record.level,
                    }),
                    Utc::now(),
                );
                session.supervision_ids.push(record.id);
            }
            Err(e) => error!(collaboration = %session.id, error = %e, "Could not activate supervision"),
        }
    }
}

#[async_trait]
impl EscalationHandler for CollaborationWorkflow {
    async fn escalate(&self, request: &EscalationRequest) -> Option<SupervisionRecord> {
        self.activate_supervision(&request.session_id, &request.reason, request.level, None)
            .map_err(|e| error!(session = %request.session_id, error = %e, "Escalation failed"))
            .ok()
    }
}
